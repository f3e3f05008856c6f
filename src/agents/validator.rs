//! 校验 Agent：不调用 LLM，按最后一条消息的发送方选择 schema 并校验
//!
//! 回复正文是可读渲染（含 VALIDATION_* 标记与 schema 名），结构化结果挂在消息上给选择器用。

use async_trait::async_trait;

use crate::agents::Agent;
use crate::core::{AgentError, AgentRole, Message};
use crate::schema::{validate_message, ValidationOutcome};

#[derive(Debug, Default, Clone)]
pub struct ValidatorAgent;

impl ValidatorAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, history: &[Message]) -> ValidationOutcome {
        match history.last() {
            Some(last) => validate_message(last),
            None => ValidationOutcome::Skipped {
                explanation: "The conversation is empty.".to_string(),
            },
        }
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Validator
    }

    fn description(&self) -> &str {
        "Validates JSON output from the researcher and planner against their schemas."
    }

    async fn invoke(&self, history: &[Message]) -> Result<Message, AgentError> {
        let outcome = self.check(history);
        match &outcome {
            ValidationOutcome::Failure { schema, reason } => {
                tracing::info!(%schema, violations = reason.lines().count(), "validation failed")
            }
            other => tracing::info!(marker = other.marker(), schema = ?other.schema(), "validated"),
        }
        Ok(Message::validation(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transcript;
    use crate::schema::SchemaKind;

    #[tokio::test]
    async fn test_validates_by_sender() {
        let mut t = Transcript::new();
        t.push(Message::user("plan a trip"));
        t.push(Message::from_agent(AgentRole::Planner, "```json\n{\"days\": []}\n```"));

        let reply = ValidatorAgent::new().invoke(t.messages()).await.unwrap();
        assert_eq!(reply.source().role(), Some(AgentRole::Validator));
        assert!(reply.content().starts_with("VALIDATION_FAILURE"));
        assert!(reply.content().contains("ItineraryPlan"));
        assert_eq!(
            reply.validation_outcome().and_then(|o| o.schema()),
            Some(SchemaKind::ItineraryPlan)
        );
    }

    #[tokio::test]
    async fn test_skips_unvalidated_senders() {
        let mut t = Transcript::new();
        t.push(Message::user("plan a trip"));
        let reply = ValidatorAgent::new().invoke(t.messages()).await.unwrap();
        assert!(reply.content().contains("VALIDATION_SKIPPED"));
        assert!(reply.content().contains("'user'"));

        assert!(matches!(
            ValidatorAgent::new().check(&[]),
            ValidationOutcome::Skipped { .. }
        ));
    }
}
