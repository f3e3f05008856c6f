//! 结构化文档：研究报告与行程计划
//!
//! 类型同时派生 JsonSchema，Agent 的提示词直接嵌入生成的 schema，与校验器保持一致。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 货币固定为 TOMAN
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Currency {
    #[default]
    #[serde(rename = "TOMAN")]
    Toman,
}

impl Currency {
    pub const LABEL: &'static str = "TOMAN";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    /// 网站或机构名称
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub topic: String,
    /// 简短事实要点，至少一条
    pub bullets: Vec<String>,
    pub sources: Vec<Source>,
    /// 0.0 ~ 1.0
    pub confidence: f64,
}

/// 研究员产出的报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchReport {
    #[serde(default)]
    pub currency: Currency,
    pub findings: Vec<Finding>,
    pub risks: Vec<String>,
    pub verification: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItineraryDay {
    /// YYYY-MM-DD
    pub date: String,
    pub summary: String,
    pub morning: Vec<String>,
    pub afternoon: Vec<String>,
    pub evening: Vec<String>,
    pub est_cost_toman: u64,
}

/// 规划师产出的行程；days 至少一天
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItineraryPlan {
    #[serde(default)]
    pub currency: Currency,
    pub overview: String,
    pub days: Vec<ItineraryDay>,
    pub total_est_cost_toman: u64,
}
