//! travel-team - 多 Agent 旅行行程规划
//!
//! 模块划分：
//! - **agents**: Agent 契约、名册、LLM 生产者（研究员 / 规划师 / 写作者）与确定性校验者
//! - **cli**: 命令行参数
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 消息与记录、错误类型、恢复引擎
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock / Scripted）
//! - **observability**: 日志初始化
//! - **schema**: 研究报告与行程计划的 schema 及校验
//! - **team**: 发言选择器、终止条件、对话主循环、构建器、记录持久化
//! - **tools**: 工具注册表、执行器与网页搜索

pub mod agents;
pub mod cli;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod schema;
pub mod team;
pub mod tools;

pub use team::{RunOutcome, TeamBuilder, TeamRun, TravelTeam};
