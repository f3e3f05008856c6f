//! 错误类型与恢复动作
//!
//! 校验失败不是错误（它是普通消息数据）；这里只收录基础设施层面的失败：LLM 后端、工具调用、配置。

use thiserror::Error;

use crate::llm::LlmError;

/// 单次 Agent 调用中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("No agent registered for role: {0}")]
    MissingAgent(String),
}

impl AgentError {
    /// 面向用户的一句话诊断（按错误种类区分）
    pub fn diagnostic(&self) -> String {
        match self {
            AgentError::Llm(LlmError::Authentication(detail)) => format!(
                "Authentication Error: your API key is invalid or expired. Details: {detail}"
            ),
            AgentError::Llm(LlmError::RateLimited(detail)) => format!(
                "Rate Limit Error: the API request limit was exceeded; wait and try again later. Details: {detail}"
            ),
            AgentError::Llm(LlmError::Timeout(secs)) => format!(
                "API Timeout Error: the request did not finish within {secs}s; try again."
            ),
            AgentError::Llm(LlmError::Connection(detail)) => format!(
                "API Connection Error: could not reach the API server; check your connection. Details: {detail}"
            ),
            other => format!("Unexpected error: {other}"),
        }
    }
}

/// 配置加载与校验错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("{0} is not set. Set it via environment variable or config file, e.g. export {0}='your_key'.")]
    MissingApiKey(&'static str),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 恢复引擎给出的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 把提示写回 Agent 的草稿对话，让模型在同一次调用内重试（工具层面的问题）
    RetryWithPrompt(String),
    /// 结束本次运行，附带诊断信息
    Abort(String),
}
