//! 校验结果（三态）与其文本渲染
//!
//! 渲染文本中的标记拼写是对外约定：VALIDATION_SUCCESS / VALIDATION_FAILURE / VALIDATION_SKIPPED，
//! 同时包含 schema 名称。

use std::fmt;

use schemars::schema_for;
use serde::{Deserialize, Serialize};

use crate::core::{AgentRole, Speaker};
use crate::schema::{ItineraryPlan, ResearchReport};

pub const MARKER_SUCCESS: &str = "VALIDATION_SUCCESS";
pub const MARKER_FAILURE: &str = "VALIDATION_FAILURE";
pub const MARKER_SKIPPED: &str = "VALIDATION_SKIPPED";

/// 两种可校验的文档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    ResearchReport,
    ItineraryPlan,
}

impl SchemaKind {
    pub fn label(&self) -> &'static str {
        match self {
            SchemaKind::ResearchReport => "ResearchReport",
            SchemaKind::ItineraryPlan => "ItineraryPlan",
        }
    }

    /// 按发送方选择 schema：researcher → ResearchReport，planner → ItineraryPlan
    pub fn for_speaker(speaker: &Speaker) -> Option<Self> {
        let role = match speaker {
            Speaker::Agent(role) => Some(*role),
            Speaker::Other(name) => name.to_lowercase().parse::<AgentRole>().ok(),
            Speaker::User => None,
        };
        match role? {
            AgentRole::Researcher => Some(SchemaKind::ResearchReport),
            AgentRole::Planner => Some(SchemaKind::ItineraryPlan),
            _ => None,
        }
    }

    /// 该 schema 的生产者
    pub fn producer(&self) -> AgentRole {
        match self {
            SchemaKind::ResearchReport => AgentRole::Researcher,
            SchemaKind::ItineraryPlan => AgentRole::Planner,
        }
    }

    /// JSON Schema（美化输出），用于拼接提示词
    pub fn json_schema(&self) -> String {
        let schema = match self {
            SchemaKind::ResearchReport => schema_for!(ResearchReport),
            SchemaKind::ItineraryPlan => schema_for!(ItineraryPlan),
        };
        serde_json::to_string_pretty(&schema).expect("generated schema serializes")
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 校验结果：成功 / 失败（附原因，逐条列出）/ 跳过
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Success { schema: SchemaKind },
    Failure { schema: SchemaKind, reason: String },
    Skipped { explanation: String },
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success { .. })
    }

    pub fn schema(&self) -> Option<SchemaKind> {
        match self {
            ValidationOutcome::Success { schema } | ValidationOutcome::Failure { schema, .. } => {
                Some(*schema)
            }
            ValidationOutcome::Skipped { .. } => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ValidationOutcome::Success { .. } => MARKER_SUCCESS,
            ValidationOutcome::Failure { .. } => MARKER_FAILURE,
            ValidationOutcome::Skipped { .. } => MARKER_SKIPPED,
        }
    }

    /// 从渲染后的文本还原结果。
    ///
    /// 先认 ResearchReport 再认 ItineraryPlan；有 schema 名但没有成功标记一律视为失败。
    /// 既无 schema 名又无 SKIPPED 标记时返回 None，由选择器走兜底分支。
    pub fn from_rendered(text: &str) -> Option<Self> {
        let schema = if text.contains(SchemaKind::ResearchReport.label()) {
            Some(SchemaKind::ResearchReport)
        } else if text.contains(SchemaKind::ItineraryPlan.label()) {
            Some(SchemaKind::ItineraryPlan)
        } else {
            None
        };

        match schema {
            Some(schema) if text.contains(MARKER_SUCCESS) => {
                Some(ValidationOutcome::Success { schema })
            }
            Some(schema) => Some(ValidationOutcome::Failure {
                schema,
                reason: strip_marker(text, MARKER_FAILURE),
            }),
            None if text.contains(MARKER_SKIPPED) => Some(ValidationOutcome::Skipped {
                explanation: strip_marker(text, MARKER_SKIPPED),
            }),
            None => None,
        }
    }
}

fn strip_marker(text: &str, marker: &str) -> String {
    match text.find(marker) {
        Some(idx) => text[idx + marker.len()..]
            .trim_start_matches(':')
            .trim()
            .to_string(),
        None => text.trim().to_string(),
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Success { schema } => write!(
                f,
                "{MARKER_SUCCESS}: The JSON is valid and conforms to the {schema} schema."
            ),
            ValidationOutcome::Failure { schema, reason } => write!(
                f,
                "{MARKER_FAILURE}: The JSON does not conform to the {schema} schema. Errors:\n{reason}"
            ),
            ValidationOutcome::Skipped { explanation } => {
                write!(f, "{MARKER_SKIPPED}: {explanation}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_text_carries_marker_and_schema() {
        let ok = ValidationOutcome::Success {
            schema: SchemaKind::ResearchReport,
        };
        let text = ok.to_string();
        assert!(text.contains("VALIDATION_SUCCESS"));
        assert!(text.contains("ResearchReport"));

        let bad = ValidationOutcome::Failure {
            schema: SchemaKind::ItineraryPlan,
            reason: "- days: must contain at least one entry".into(),
        };
        let text = bad.to_string();
        assert!(text.contains("VALIDATION_FAILURE"));
        assert!(text.contains("ItineraryPlan"));
        assert!(!text.contains("VALIDATION_SUCCESS"));
    }

    #[test]
    fn test_from_rendered() {
        let bad = ValidationOutcome::Failure {
            schema: SchemaKind::ItineraryPlan,
            reason: "- overview: missing required field".into(),
        };
        assert_eq!(
            ValidationOutcome::from_rendered(&bad.to_string()).and_then(|o| o.schema()),
            Some(SchemaKind::ItineraryPlan)
        );

        // 无标记但有 schema 名：按失败处理
        let parsed = ValidationOutcome::from_rendered("ResearchReport looked odd").unwrap();
        assert!(!parsed.is_success());

        let skipped = ValidationOutcome::from_rendered(
            "VALIDATION_SKIPPED: No validation rule for sender 'writer'.",
        )
        .unwrap();
        assert!(matches!(skipped, ValidationOutcome::Skipped { ref explanation } if explanation.contains("writer")));

        assert!(ValidationOutcome::from_rendered("all good").is_none());
    }

    #[test]
    fn test_for_speaker() {
        assert_eq!(
            SchemaKind::for_speaker(&Speaker::Agent(AgentRole::Researcher)),
            Some(SchemaKind::ResearchReport)
        );
        assert_eq!(
            SchemaKind::for_speaker(&Speaker::Other("Planner".into())),
            Some(SchemaKind::ItineraryPlan)
        );
        assert_eq!(SchemaKind::for_speaker(&Speaker::Agent(AgentRole::Writer)), None);
        assert_eq!(SchemaKind::for_speaker(&Speaker::User), None);
    }

    #[test]
    fn test_json_schema_mentions_fields() {
        let schema = SchemaKind::ItineraryPlan.json_schema();
        assert!(schema.contains("total_est_cost_toman"));
        assert!(schema.contains("est_cost_toman"));
    }
}
