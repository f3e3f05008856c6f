//! LLM 驱动的生产者（研究员 / 规划师 / 写作者）
//!
//! 每次 invoke：把共享记录转成聊天消息 → 调用后端（带超时）→ 产出一条消息。
//! 研究员额外带一个工具回路：模型回复 `{"tool": ..., "args": ...}` 时执行工具，把 Observation
//! 写进本次调用的草稿对话后再问一次，直到得到非工具回复或用尽轮数。草稿对话不进入共享记录。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::Agent;
use crate::core::{AgentError, AgentRole, Message, RecoveryAction, RecoveryEngine, Speaker};
use crate::llm::{ChatMessage, CompletionOptions, LlmClient, LlmError};
use crate::schema::extract_json_payload;
use crate::tools::ToolExecutor;

/// 模型发出的工具调用（{"tool": "web_search", "args": {"query": "..."}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolParse {
    /// 非工具回复，作为最终消息
    Final,
    Call(ToolCall),
    /// 看起来想调工具，但 JSON 写坏了
    Malformed(String),
}

/// 判断模型回复是否为工具调用；支持裸 JSON 与 ```json 围栏
pub fn parse_tool_call(output: &str) -> ToolParse {
    let trimmed = output.trim();
    let payload = if trimmed.contains("```") {
        extract_json_payload(trimmed)
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => return ToolParse::Final,
        }
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => match map.get("tool").and_then(|v| v.as_str()) {
            Some(name) if !name.trim().is_empty() => ToolParse::Call(ToolCall {
                tool: name.trim().to_string(),
                args: map.get("args").cloned().unwrap_or_else(|| Value::Object(Default::default())),
            }),
            _ => ToolParse::Final,
        },
        Ok(_) => ToolParse::Final,
        Err(e) if payload.contains("\"tool\"") => ToolParse::Malformed(format!("{e}: {payload}")),
        Err(_) => ToolParse::Final,
    }
}

/// 研究员的工具回路配置
pub struct ToolLoop {
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    max_rounds: usize,
}

impl ToolLoop {
    pub fn new(executor: ToolExecutor, max_rounds: usize) -> Self {
        Self {
            executor,
            recovery: RecoveryEngine::new(),
            max_rounds,
        }
    }
}

/// 通用 LLM Agent：角色 + 系统提示词 + 生成参数 + 可选工具回路
pub struct LlmAgent {
    role: AgentRole,
    description: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
    options: CompletionOptions,
    timeout: Duration,
    tools: Option<ToolLoop>,
}

impl LlmAgent {
    pub fn new(
        role: AgentRole,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            role,
            description: description.into(),
            system_prompt: system_prompt.into(),
            llm,
            options: CompletionOptions::default(),
            timeout: Duration::from_secs(30),
            tools: None,
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tools(mut self, tools: ToolLoop) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 共享记录 → 聊天消息：自己说过的话是 assistant，其余一律是带 [发送方] 前缀的 user
    pub fn render_history(&self, history: &[Message]) -> Vec<ChatMessage> {
        let own = Speaker::Agent(self.role);
        let mut out = Vec::with_capacity(history.len() + 1);
        out.push(ChatMessage::system(self.system_prompt.clone()));
        out.extend(history.iter().map(|m| {
            if *m.source() == own {
                ChatMessage::assistant(m.content())
            } else {
                ChatMessage::user(format!("[{}] {}", m.source(), m.content()))
            }
        }));
        out
    }

    async fn call_llm(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        match tokio::time::timeout(self.timeout, self.llm.complete(messages, &self.options)).await
        {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(role = %self.role, timeout_secs = self.timeout.as_secs(), "backend call timed out");
                Err(AgentError::Llm(LlmError::Timeout(self.timeout.as_secs())))
            }
        }
    }

    async fn run_tool_loop(
        &self,
        tools: &ToolLoop,
        mut scratch: Vec<ChatMessage>,
    ) -> Result<String, AgentError> {
        let mut rounds = 0;
        loop {
            let reply = self.call_llm(&scratch).await?;

            let err = match parse_tool_call(&reply) {
                ToolParse::Final => return Ok(reply),
                _ if rounds >= tools.max_rounds => {
                    tracing::warn!(role = %self.role, rounds, "tool budget used up, asking for the final answer");
                    scratch.push(ChatMessage::assistant(reply));
                    scratch.push(ChatMessage::user(
                        "Tool budget exhausted. Reply now with the final JSON only, without calling tools.",
                    ));
                    return self.call_llm(&scratch).await;
                }
                ToolParse::Call(call) => {
                    rounds += 1;
                    scratch.push(ChatMessage::assistant(reply));
                    match tools.executor.execute(&call.tool, call.args).await {
                        Ok(observation) => {
                            scratch.push(ChatMessage::user(format!(
                                "Observation from {}:\n{}",
                                call.tool, observation
                            )));
                            continue;
                        }
                        Err(e) => e,
                    }
                }
                ToolParse::Malformed(raw) => {
                    rounds += 1;
                    scratch.push(ChatMessage::assistant(reply));
                    AgentError::JsonParseError(raw)
                }
            };

            match tools.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::info!(role = %self.role, error = %err, "tool step failed, feeding back");
                    scratch.push(ChatMessage::user(prompt));
                }
                RecoveryAction::Abort(_) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, history: &[Message]) -> Result<Message, AgentError> {
        let scratch = self.render_history(history);
        let content = match &self.tools {
            Some(tools) => self.run_tool_loop(tools, scratch).await?,
            None => self.call_llm(&scratch).await?,
        };
        tracing::debug!(role = %self.role, chars = content.len(), "agent replied");
        Ok(Message::from_agent(self.role, content))
    }
}
