//! 对话记录：消息、发言者与只追加的 Transcript
//!
//! Transcript 由对话循环独占写入；选择器与各 Agent 只读完整前缀。序号在 push 时分配，之后不可修改。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::ValidationOutcome;

/// 固定的 Agent 集合（研究、规划、写作、校验）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Researcher,
    Planner,
    Writer,
    Validator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Researcher,
        AgentRole::Planner,
        AgentRole::Writer,
        AgentRole::Validator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Planner => "planner",
            AgentRole::Writer => "writer",
            AgentRole::Validator => "validator",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researcher" => Ok(AgentRole::Researcher),
            "planner" => Ok(AgentRole::Planner),
            "writer" => Ok(AgentRole::Writer),
            "validator" => Ok(AgentRole::Validator),
            other => Err(format!("unknown agent role: {other}")),
        }
    }
}

/// 消息发送方：用户、团队内 Agent，或无法识别的名字（原样保留用于诊断）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Agent(AgentRole),
    Other(String),
}

impl Speaker {
    /// 按名字精确匹配（区分大小写），未知名字落入 Other
    pub fn from_name(name: &str) -> Self {
        if name == "user" {
            return Speaker::User;
        }
        match name.parse::<AgentRole>() {
            Ok(role) => Speaker::Agent(role),
            Err(_) => Speaker::Other(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Speaker::User => "user",
            Speaker::Agent(role) => role.as_str(),
            Speaker::Other(name) => name,
        }
    }

    pub fn role(&self) -> Option<AgentRole> {
        match self {
            Speaker::Agent(role) => Some(*role),
            _ => None,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<AgentRole> for Speaker {
    fn from(role: AgentRole) -> Self {
        Speaker::Agent(role)
    }
}

impl Serialize for Speaker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Speaker::from_name(&name))
    }
}

/// 单条消息；只有校验 Agent 会附带结构化的 validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    source: Speaker,
    content: String,
    ordinal: usize,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationOutcome>,
}

impl Message {
    /// 尚未入列的消息，序号由 Transcript::push 分配
    pub fn new(source: impl Into<Speaker>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            ordinal: 0,
            created_at: Utc::now(),
            validation: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn from_agent(role: AgentRole, content: impl Into<String>) -> Self {
        Self::new(role, content)
    }

    /// 校验结果消息：正文为可读渲染，同时保留结构化结果供选择器使用
    pub fn validation(outcome: ValidationOutcome) -> Self {
        let mut msg = Self::new(AgentRole::Validator, outcome.to_string());
        msg.validation = Some(outcome);
        msg
    }

    pub fn source(&self) -> &Speaker {
        &self.source
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 结构化校验结果；缺失时（如从磁盘恢复的旧记录）退回解析正文中的标记
    pub fn validation_outcome(&self) -> Option<ValidationOutcome> {
        if let Some(outcome) = &self.validation {
            return Some(outcome.clone());
        }
        if self.source == Speaker::Agent(AgentRole::Validator) {
            return ValidationOutcome::from_rendered(&self.content);
        }
        None
    }
}

impl From<String> for Speaker {
    fn from(name: String) -> Self {
        Speaker::from_name(&name)
    }
}

impl From<&str> for Speaker {
    fn from(name: &str) -> Self {
        Speaker::from_name(name)
    }
}

/// 只追加的对话历史
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条消息并返回其序号
    pub fn push(&mut self, mut msg: Message) -> usize {
        let ordinal = self.messages.len();
        msg.ordinal = ordinal;
        self.messages.push(msg);
        ordinal
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 某个发送方在记录中出现的次数
    pub fn count_from(&self, speaker: &Speaker) -> usize {
        self.messages.iter().filter(|m| m.source() == speaker).count()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        let mut transcript = Transcript::new();
        for msg in messages {
            transcript.push(msg);
        }
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    #[test]
    fn test_speaker_from_name() {
        assert_eq!(Speaker::from_name("user"), Speaker::User);
        assert_eq!(
            Speaker::from_name("planner"),
            Speaker::Agent(AgentRole::Planner)
        );
        // 精确匹配，不做大小写折叠
        assert_eq!(
            Speaker::from_name("Planner"),
            Speaker::Other("Planner".to_string())
        );
    }

    #[test]
    fn test_push_assigns_ordinals() {
        let mut t = Transcript::new();
        assert_eq!(t.push(Message::user("plan a trip")), 0);
        assert_eq!(t.push(Message::from_agent(AgentRole::Researcher, "{}")), 1);
        let ordinals: Vec<_> = t.messages().iter().map(|m| m.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(t.count_from(&Speaker::User), 1);
    }

    #[test]
    fn test_validation_outcome_falls_back_to_text() {
        let structured = Message::validation(ValidationOutcome::Success {
            schema: SchemaKind::ItineraryPlan,
        });
        let text_only = Message::from_agent(AgentRole::Validator, structured.content());
        assert_eq!(
            text_only.validation_outcome(),
            structured.validation_outcome()
        );

        // 非校验者的正文即便含标记也不算校验结果
        let spoof = Message::from_agent(
            AgentRole::Planner,
            "VALIDATION_SUCCESS ItineraryPlan",
        );
        assert!(spoof.validation_outcome().is_none());
    }

    #[test]
    fn test_transcript_serde_keeps_source_names() {
        let mut t = Transcript::new();
        t.push(Message::user("hi"));
        t.push(Message::new("critic", "hmm"));
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"source\":\"critic\""));
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages()[1].source(), &Speaker::Other("critic".into()));
    }
}
