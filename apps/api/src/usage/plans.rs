//! Subscription plans and the limits they gate.

use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Free,
    Pro,
    Plus,
}

impl PlanType {
    /// Parses a stored plan string. Missing or unknown values are `Free`.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("pro") => PlanType::Pro,
            Some("plus") => PlanType::Plus,
            _ => PlanType::Free,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
            PlanType::Plus => "plus",
        }
    }
}

/// A counter ceiling. Serializes as a number or the string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u32),
    Unlimited,
}

impl Limit {
    pub fn allows(self, current: u32) -> bool {
        match self {
            Limit::Count(max) => current < max,
            Limit::Unlimited => true,
        }
    }

    pub fn remaining(self, current: u32) -> Limit {
        match self {
            Limit::Count(max) => Limit::Count(max.saturating_sub(current)),
            Limit::Unlimited => Limit::Unlimited,
        }
    }

    /// Returns the numeric ceiling, if any.
    pub fn count(self) -> Option<u32> {
        match self {
            Limit::Count(max) => Some(max),
            Limit::Unlimited => None,
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::Count(n) => serializer.serialize_u32(*n),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub chats_per_day: Limit,
    pub file_uploads_per_day: Limit,
    pub web_searches_per_month: Limit,
    pub max_file_size_mb: u64,
    pub features: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    pub name: PlanType,
    pub display_name: &'static str,
    pub price: u32,
    pub description: &'static str,
    pub limits: PlanLimits,
}

pub fn plan_config(plan: PlanType) -> PlanConfig {
    match plan {
        PlanType::Free => PlanConfig {
            name: plan,
            display_name: "Free",
            price: 0,
            description: "Start exploring AI-powered learning for free.",
            limits: PlanLimits {
                chats_per_day: Limit::Count(15),
                file_uploads_per_day: Limit::Count(5),
                web_searches_per_month: Limit::Count(5),
                max_file_size_mb: 25,
                features: &["basic-chat", "basic-tools", "file-uploads", "web-search"],
            },
        },
        PlanType::Pro => PlanConfig {
            name: plan,
            display_name: "Pro",
            price: 5,
            description: "Unlimited knowledge, unlimited possibilities.",
            limits: PlanLimits {
                chats_per_day: Limit::Unlimited,
                file_uploads_per_day: Limit::Count(20),
                web_searches_per_month: Limit::Count(50),
                max_file_size_mb: 500,
                features: &[
                    "advanced-chat",
                    "all-tools",
                    "file-uploads",
                    "export",
                    "web-search",
                    "priority-support",
                ],
            },
        },
        PlanType::Plus => PlanConfig {
            name: plan,
            display_name: "Plus",
            price: 15,
            description: "For power users who need everything.",
            limits: PlanLimits {
                chats_per_day: Limit::Unlimited,
                file_uploads_per_day: Limit::Unlimited,
                web_searches_per_month: Limit::Unlimited,
                max_file_size_mb: 2000,
                features: &[
                    "advanced-chat",
                    "all-tools",
                    "file-uploads",
                    "export",
                    "admin",
                    "analytics",
                    "sso",
                    "web-search",
                    "priority-support",
                    "custom-ai",
                ],
            },
        },
    }
}

pub fn has_feature(plan: PlanType, feature: &str) -> bool {
    plan_config(plan).limits.features.contains(&feature)
}

pub fn can_start_chat(plan: PlanType, current: u32) -> bool {
    plan_config(plan).limits.chats_per_day.allows(current)
}

pub fn can_upload_file(plan: PlanType, current: u32) -> bool {
    plan_config(plan).limits.file_uploads_per_day.allows(current)
}

pub fn can_perform_web_search(plan: PlanType, current: u32) -> bool {
    plan_config(plan).limits.web_searches_per_month.allows(current)
}

pub fn remaining_chats(plan: PlanType, current: u32) -> Limit {
    plan_config(plan).limits.chats_per_day.remaining(current)
}

pub fn remaining_file_uploads(plan: PlanType, current: u32) -> Limit {
    plan_config(plan).limits.file_uploads_per_day.remaining(current)
}

/// Percentage of `limit` consumed, capped at 100. Unlimited is always 0.
pub fn usage_percentage(limit: Limit, current: u32) -> f64 {
    match limit {
        Limit::Unlimited => 0.0,
        Limit::Count(0) => 100.0,
        Limit::Count(max) => (current as f64 / max as f64 * 100.0).min(100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_db_defaults_to_free() {
        assert_eq!(PlanType::from_db(None), PlanType::Free);
        assert_eq!(PlanType::from_db(Some("enterprise")), PlanType::Free);
        assert_eq!(PlanType::from_db(Some("PRO")), PlanType::Pro);
        assert_eq!(PlanType::from_db(Some("plus")), PlanType::Plus);
    }

    #[test]
    fn test_free_chat_limit() {
        assert!(can_start_chat(PlanType::Free, 14));
        assert!(!can_start_chat(PlanType::Free, 15));
        assert!(can_start_chat(PlanType::Pro, 10_000));
    }

    #[test]
    fn test_upload_limits() {
        assert!(!can_upload_file(PlanType::Free, 5));
        assert!(can_upload_file(PlanType::Pro, 19));
        assert!(!can_upload_file(PlanType::Pro, 20));
        assert!(can_upload_file(PlanType::Plus, 500));
    }

    #[test]
    fn test_web_search_limits() {
        assert!(can_perform_web_search(PlanType::Free, 4));
        assert!(!can_perform_web_search(PlanType::Free, 5));
        assert!(!can_perform_web_search(PlanType::Pro, 50));
    }

    #[test]
    fn test_remaining_never_negative() {
        assert_eq!(remaining_chats(PlanType::Free, 20), Limit::Count(0));
        assert_eq!(remaining_chats(PlanType::Free, 3), Limit::Count(12));
        assert_eq!(remaining_file_uploads(PlanType::Plus, 3), Limit::Unlimited);
    }

    #[test]
    fn test_features() {
        assert!(has_feature(PlanType::Plus, "custom-ai"));
        assert!(!has_feature(PlanType::Pro, "custom-ai"));
        assert!(has_feature(PlanType::Free, "web-search"));
    }

    #[test]
    fn test_usage_percentage_caps() {
        assert_eq!(usage_percentage(Limit::Unlimited, 99), 0.0);
        assert_eq!(usage_percentage(Limit::Count(10), 5), 50.0);
        assert_eq!(usage_percentage(Limit::Count(10), 50), 100.0);
    }

    #[test]
    fn test_limit_serializes_as_number_or_unlimited() {
        assert_eq!(serde_json::to_string(&Limit::Count(15)).unwrap(), "15");
        assert_eq!(
            serde_json::to_string(&Limit::Unlimited).unwrap(),
            "\"unlimited\""
        );
    }
}
