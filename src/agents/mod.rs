//! 团队成员：统一的 Agent 契约与按角色索引的名册
//!
//! 角色集合是封闭的（AgentRole），每个角色在名册中恰好对应一个实现。

pub mod producer;
pub mod prompts;
pub mod validator;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentError, AgentRole, Message};

pub use producer::{parse_tool_call, LlmAgent, ToolCall, ToolLoop, ToolParse};
pub use validator::ValidatorAgent;

/// Agent 契约：拿到完整历史，产出恰好一条署自己名字的消息。
///
/// 同一份历史可能被连续调用两次（自我纠正回路），实现不得依赖调用次数。
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> AgentRole;

    fn description(&self) -> &str;

    async fn invoke(&self, history: &[Message]) -> Result<Message, AgentError>;
}

/// 角色 → 实现
#[derive(Default, Clone)]
pub struct AgentRoster {
    agents: HashMap<AgentRole, Arc<dyn Agent>>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同一角色重复注册时后者覆盖前者
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.role(), agent);
    }

    pub fn with(mut self, agent: impl Agent + 'static) -> Self {
        self.register(Arc::new(agent));
        self
    }

    pub fn get(&self, role: AgentRole) -> Option<Arc<dyn Agent>> {
        self.agents.get(&role).cloned()
    }

    /// 尚未注册的角色
    pub fn missing_roles(&self) -> Vec<AgentRole> {
        AgentRole::ALL
            .into_iter()
            .filter(|r| !self.agents.contains_key(r))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_roles().is_empty()
    }

    /// (名称, 描述)，用于启动日志
    pub fn describe(&self) -> Vec<(String, String)> {
        AgentRole::ALL
            .into_iter()
            .filter_map(|r| self.agents.get(&r))
            .map(|a| (a.role().to_string(), a.description().to_string()))
            .collect()
    }
}
