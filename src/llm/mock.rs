//! 测试与离线演示用客户端（无需 API）
//!
//! - MockLlmClient：按角色返回固定的合法产出（研究报告 / 单日行程 / 简短文案），`--mock` 时使用
//! - ScriptedLlmClient：按顺序回放预置回复，记录每次收到的消息，供集成测试断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::core::AgentRole;
use crate::llm::{ChatMessage, CompletionOptions, LlmClient, LlmError, Role};

/// 离线客户端：一个角色一个实例
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    role: AgentRole,
}

impl MockLlmClient {
    pub fn for_role(role: AgentRole) -> Self {
        Self { role }
    }

    fn user_request(messages: &[ChatMessage]) -> &str {
        messages
            .iter()
            .filter(|m| matches!(m.role, Role::User))
            .find_map(|m| m.content.strip_prefix("[user] "))
            .unwrap_or("(no request)")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let request = Self::user_request(messages);
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let reply = match self.role {
            AgentRole::Researcher => json!({
                "currency": "TOMAN",
                "findings": [{
                    "topic": "Request summary",
                    "bullets": [format!("Offline research for: {request}")],
                    "sources": [{"name": "Mock", "url": "https://example.com"}],
                    "confidence": 0.5
                }],
                "risks": ["Offline mode: facts are placeholders"],
                "verification": ["Re-run with a real backend"]
            })
            .to_string(),
            AgentRole::Planner => json!({
                "currency": "TOMAN",
                "overview": format!("Offline itinerary for: {request}"),
                "days": [{
                    "date": today,
                    "summary": "Arrival and orientation",
                    "morning": ["Check in"],
                    "afternoon": ["Walk around the centre"],
                    "evening": ["Dinner near the hotel"],
                    "est_cost_toman": 0
                }],
                "total_est_cost_toman": 0
            })
            .to_string(),
            AgentRole::Writer => format!("Day 1 ({today}): arrival, a short walk, dinner. Request: {request}"),
            AgentRole::Validator => String::new(),
        };
        Ok(reply)
    }
}

/// 回放客户端：回复用尽后返回 Api 错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已被调用的次数
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 每次调用收到的完整消息列表
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, SchemaKind};

    #[tokio::test]
    async fn test_mock_outputs_are_valid() {
        let history = vec![
            ChatMessage::system("rules"),
            ChatMessage::user("[user] two days in Mashhad"),
        ];
        let opts = CompletionOptions::default();

        let report = MockLlmClient::for_role(AgentRole::Researcher)
            .complete(&history, &opts)
            .await
            .unwrap();
        assert!(validate(&report, Some(SchemaKind::ResearchReport)).is_success());
        assert!(report.contains("two days in Mashhad"));

        let plan = MockLlmClient::for_role(AgentRole::Planner)
            .complete(&history, &opts)
            .await
            .unwrap();
        assert!(validate(&plan, Some(SchemaKind::ItineraryPlan)).is_success());
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let client = ScriptedLlmClient::new(["first", "second"]);
        let opts = CompletionOptions::default();
        assert_eq!(client.complete(&[], &opts).await.unwrap(), "first");
        assert_eq!(client.complete(&[], &opts).await.unwrap(), "second");
        assert!(matches!(
            client.complete(&[], &opts).await,
            Err(LlmError::Api(_))
        ));
        assert_eq!(client.calls(), 3);
    }
}
