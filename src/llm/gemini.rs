//! Gemini（OpenAI 兼容端点）
//!
//! Google 提供与 OpenAI 兼容的 chat completions 接口，直接复用 OpenAiClient。
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 模型: gemini-2.5-flash（默认）

use crate::config::LlmSection;
use crate::core::ConfigError;
use crate::llm::OpenAiClient;

pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.5-flash";

/// 按 [llm] 段创建客户端；API Key 缺失时报错（不再用占位 key 静默失败）
pub fn create_gemini_client(section: &LlmSection) -> Result<OpenAiClient, ConfigError> {
    let api_key = section.resolved_api_key()?;
    let base_url = section
        .base_url
        .as_deref()
        .unwrap_or(GEMINI_OPENAI_BASE_URL);
    Ok(OpenAiClient::new(Some(base_url), &section.model, &api_key))
}
