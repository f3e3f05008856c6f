//! 错误恢复引擎
//!
//! 工具层面的失败（超时、执行失败、幻觉工具、调用 JSON 写坏）作为 Observation 回写给研究员自行纠正；
//! LLM 后端失败属于基础设施问题，不做无限重试，直接终止并给出诊断。

use crate::core::{AgentError, RecoveryAction};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your last tool call was not valid JSON: {raw}. \
                 To call a tool, output exactly one JSON object of the form \
                 {{\"tool\": \"web_search\", \"args\": {{\"query\": \"...\"}}}} and nothing else."
            )),
            AgentError::HallucinatedTool(name) => RecoveryAction::RetryWithPrompt(format!(
                "Tool '{name}' does not exist. The only available tool is web_search."
            )),
            AgentError::ToolTimeout(name) => RecoveryAction::RetryWithPrompt(format!(
                "Tool '{name}' timed out. Continue with the information you already have or try a narrower query."
            )),
            AgentError::ToolExecutionFailed(msg) => {
                RecoveryAction::RetryWithPrompt(format!("Tool call failed: {msg}"))
            }
            AgentError::Llm(_) | AgentError::MissingAgent(_) => {
                RecoveryAction::Abort(err.diagnostic())
            }
        }
    }
}
