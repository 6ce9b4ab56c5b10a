use serde::Serialize;

/// Prompt template a tool dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    ConceptExplainer,
    LessonPlan,
    Worksheet,
    Rubric,
    StudyGuide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Learning,
    Teaching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    #[serde(skip)]
    pub kind: ToolKind,
}

/// Study Buddy shares the study guide template.
pub const TOOLS: &[Tool] = &[
    Tool {
        id: "concept-explainer",
        name: "Concept Explainer",
        description: "Break down any topic into simple, understandable chunks",
        category: ToolCategory::Learning,
        kind: ToolKind::ConceptExplainer,
    },
    Tool {
        id: "study-buddy",
        name: "Study Buddy",
        description: "Get homework help, practice problems, and exam prep",
        category: ToolCategory::Learning,
        kind: ToolKind::StudyGuide,
    },
    Tool {
        id: "lesson-plan-generator",
        name: "Lesson Plan Generator",
        description: "Create comprehensive lesson plans with pacing and engagement",
        category: ToolCategory::Teaching,
        kind: ToolKind::LessonPlan,
    },
    Tool {
        id: "worksheet-generator",
        name: "Worksheet & Quiz Generator",
        description: "Generate formative assessments with answer keys",
        category: ToolCategory::Teaching,
        kind: ToolKind::Worksheet,
    },
    Tool {
        id: "rubric-builder",
        name: "Rubric Builder",
        description: "Build clear, scalable grading criteria",
        category: ToolCategory::Teaching,
        kind: ToolKind::Rubric,
    },
    Tool {
        id: "study-guide",
        name: "Study Guide",
        description: "Create personalized study guides with key concepts and practice",
        category: ToolCategory::Learning,
        kind: ToolKind::StudyGuide,
    },
];

pub fn find_tool(id: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|t| t.id == id)
}
