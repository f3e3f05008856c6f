//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock / Scripted）实现 LlmClient::complete（非流式）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 后端调用失败的分类；决定最终给用户的诊断文案
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {0}")]
    Api(String),
}

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 发给后端的单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 单次调用的生成参数（按 Agent 区分温度）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// 累计 token 使用：(prompt, completion, total)；默认不统计
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
