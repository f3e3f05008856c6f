//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TRAVEL__*` 覆盖（双下划线表示嵌套，如 `TRAVEL__TEAM__MAX_MESSAGES=20`）。
//! 密钥另外支持常用的平铺变量：`GOOGLE_API_KEY`、`TAVILY_API_KEY`。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::ConfigError;
use crate::llm::{GEMINI_FLASH, GEMINI_OPENAI_BASE_URL};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const TAVILY_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub team: TeamSection,
    pub llm: LlmSection,
    pub search: SearchSection,
}

/// [team] 段：终止条件与重试上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeamSection {
    /// 消息总数上限（含用户的首条消息）
    pub max_messages: usize,
    /// 任一消息包含该词即终止（区分大小写的子串匹配）；空字符串表示关闭
    pub stop_keyword: String,
    /// 每个阶段允许的校验失败重试次数；0 表示不限，仅靠 max_messages 兜底
    pub max_stage_retries: usize,
    /// 运行结束后把完整记录写入该 JSON 文件
    pub transcript_path: Option<PathBuf>,
}

impl Default for TeamSection {
    fn default() -> Self {
        Self {
            max_messages: 12,
            stop_keyword: "TERMINATE".to_string(),
            max_stage_retries: 3,
            transcript_path: None,
        }
    }
}

/// [llm] 段：模型、端点、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 单次后端调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: GEMINI_FLASH.to_string(),
            base_url: Some(GEMINI_OPENAI_BASE_URL.to_string()),
            api_key: None,
            temperature: 0.4,
            max_tokens: 4096,
            timeout_secs: 30,
        }
    }
}

impl LlmSection {
    /// 配置文件中的 key 优先，其次 GOOGLE_API_KEY；都没有则报错
    pub fn resolved_api_key(&self) -> Result<String, ConfigError> {
        non_blank(self.api_key.clone())
            .or_else(|| non_blank(std::env::var(GOOGLE_API_KEY_ENV).ok()))
            .ok_or(ConfigError::MissingApiKey(GOOGLE_API_KEY_ENV))
    }

    /// 研究员温度偏低，写作偏高，规划用配置值
    pub fn researcher_temperature(&self) -> f32 {
        self.temperature.min(0.35)
    }

    pub fn planner_temperature(&self) -> f32 {
        self.temperature
    }

    pub fn writer_temperature(&self) -> f32 {
        self.temperature.max(0.5)
    }
}

/// [search] 段：Tavily 参数与研究员的工具轮数上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub search_depth: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub max_tool_rounds: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            search_depth: "basic".to_string(),
            max_results: 3,
            timeout_secs: 15,
            max_tool_rounds: 4,
        }
    }
}

impl SearchSection {
    /// 缺失时搜索工具仍可注册，只是每次都返回 success=false
    pub fn resolved_api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone())
            .or_else(|| non_blank(std::env::var(TAVILY_API_KEY_ENV).ok()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|k| !k.trim().is_empty())
}

impl AppConfig {
    /// 基本取值检查（API Key 的检查推迟到真正创建客户端时）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.team.max_messages == 0 {
            return Err(ConfigError::Invalid("team.max_messages must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid("llm.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 TRAVEL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TRAVEL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TRAVEL")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.team.max_messages, 12);
        assert_eq!(cfg.team.stop_keyword, "TERMINATE");
        assert_eq!(cfg.llm.model, "gemini-2.5-flash");
        assert_eq!(cfg.search.max_results, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_agent_temperatures() {
        let llm = LlmSection {
            temperature: 0.4,
            ..LlmSection::default()
        };
        assert_eq!(llm.researcher_temperature(), 0.35);
        assert_eq!(llm.planner_temperature(), 0.4);
        assert_eq!(llm.writer_temperature(), 0.5);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[team]\nmax_messages = 5\nstop_keyword = \"DONE\"\n\n[llm]\ntemperature = 0.9\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.team.max_messages, 5);
        assert_eq!(cfg.team.stop_keyword, "DONE");
        assert_eq!(cfg.llm.temperature, 0.9);
        // 未出现的键保持默认
        assert_eq!(cfg.team.max_stage_retries, 3);
        assert_eq!(cfg.search.search_depth, "basic");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = AppConfig::default();
        cfg.team.max_messages = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_configured_key_wins() {
        let llm = LlmSection {
            api_key: Some("from-file".into()),
            ..LlmSection::default()
        };
        assert_eq!(llm.resolved_api_key().unwrap(), "from-file");

        let blank = LlmSection {
            api_key: Some("   ".into()),
            ..LlmSection::default()
        };
        // 空白 key 不算配置；是否报错取决于环境变量，这里只验证空白值不会被原样返回
        assert_ne!(blank.resolved_api_key().ok().as_deref(), Some("   "));
    }
}
