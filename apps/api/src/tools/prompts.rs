use serde_json::Value;

use crate::tools::catalog::ToolKind;

/// Builds the user prompt for a tool run. `input` is embedded as JSON so
/// structured form input reaches the model unchanged.
pub fn build_tool_prompt(kind: ToolKind, input: &Value, context: Option<&str>) -> String {
    let input = match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut prompt = match kind {
        ToolKind::LessonPlan => format!(
            "Generate a comprehensive lesson plan based on this input: {input}\n\
             Include: learning objectives, materials needed, estimated time, engagement hooks, \
             activities, assessment methods, and differentiation strategies."
        ),
        ToolKind::Worksheet => format!(
            "Create an educational worksheet based on: {input}\n\
             Include: clear instructions, varied question types (multiple choice, short answer, \
             essay), and an answer key if applicable."
        ),
        ToolKind::Rubric => format!(
            "Build a detailed grading rubric for: {input}\n\
             Include: clear criteria, performance levels (exemplary, proficient, developing, \
             beginning), and point values."
        ),
        ToolKind::StudyGuide => format!(
            "Create a study guide for: {input}\n\
             Include: key concepts, summary notes, practice questions, test-taking tips, and \
             recommended resources."
        ),
        ToolKind::ConceptExplainer => format!(
            "Explain this concept in simple, engaging terms: {input}\n\
             Use analogies, real-world examples, and break it down into digestible parts."
        ),
    };

    if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\n\nAdditional context:\n");
        prompt.push_str(ctx);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_input_is_not_quoted() {
        let p = build_tool_prompt(ToolKind::ConceptExplainer, &json!("osmosis"), None);
        assert!(p.starts_with("Explain this concept in simple, engaging terms: osmosis\n"));
    }

    #[test]
    fn test_structured_input_embedded_as_json() {
        let p = build_tool_prompt(
            ToolKind::LessonPlan,
            &json!({"topic": "fractions", "grade": 4}),
            None,
        );
        assert!(p.contains(r#""topic":"fractions""#));
        assert!(p.contains("differentiation strategies"));
    }

    #[test]
    fn test_context_appended_when_present() {
        let p = build_tool_prompt(ToolKind::Rubric, &json!("essay"), Some("Grade 9 ELA"));
        assert!(p.ends_with("Additional context:\nGrade 9 ELA"));

        let blank = build_tool_prompt(ToolKind::Rubric, &json!("essay"), Some("   "));
        assert!(!blank.contains("Additional context"));
    }
}
