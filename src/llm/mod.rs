//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock / Scripted）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

pub use gemini::{create_gemini_client, GEMINI_FLASH, GEMINI_OPENAI_BASE_URL};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ChatMessage, CompletionOptions, LlmClient, LlmError, Role};
