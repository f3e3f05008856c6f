//! 核心层：消息与对话记录、错误与恢复

pub mod error;
pub mod message;
pub mod recovery;

pub use error::{AgentError, ConfigError, RecoveryAction};
pub use message::{AgentRole, Message, Speaker, Transcript};
pub use recovery::RecoveryEngine;
