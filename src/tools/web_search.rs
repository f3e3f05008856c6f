//! 网页搜索：SearchProvider 抽象、Tavily 实现与暴露给研究员的 web_search 工具
//!
//! 约定：search 永不向外抛错。缺少 Key、网络错误、非 2xx 都表现为 success=false + error，sources 为空。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SearchSection;
use crate::schema::Source;
use crate::tools::Tool;

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// 一次搜索的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: String::new(),
            sources: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> SearchOutcome;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// Tavily 搜索；include_answer 拿到摘要，结果只保留前 max_results 条
pub struct TavilySearch {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    search_depth: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn from_config(section: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: section.resolved_api_key(),
            endpoint: section
                .endpoint
                .clone()
                .unwrap_or_else(|| TAVILY_ENDPOINT.to_string()),
            search_depth: section.search_depth.clone(),
            max_results: section.max_results,
        }
    }

    async fn request(&self, api_key: &str, query: &str) -> Result<SearchOutcome, String> {
        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "search_depth": self.search_depth,
            "include_answer": true,
            "max_results": self.max_results,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {e}"))?;

        Ok(SearchOutcome {
            success: true,
            answer: parsed
                .answer
                .unwrap_or_else(|| "No summary answer found.".to_string()),
            sources: parsed
                .results
                .into_iter()
                .filter(|r| !r.url.is_empty())
                .take(self.max_results)
                .map(|r| Source {
                    name: r.title,
                    url: r.url,
                })
                .collect(),
            error: None,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> SearchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return SearchOutcome::failed(
                "Tavily API key is not configured. Cannot perform web search.",
            );
        };
        match self.request(api_key, query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "web search failed");
                SearchOutcome::failed(e)
            }
        }
    }
}

/// 研究员可调用的工具：{"query": "..."} → SearchOutcome 的 JSON
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date travel facts. Returns {success, answer, sources: [{name, url}], error?}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        tracing::info!(query = %query, "web_search");
        let outcome = self.provider.search(query).await;
        serde_json::to_string(&outcome).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned;

    #[async_trait]
    impl SearchProvider for Canned {
        async fn search(&self, query: &str) -> SearchOutcome {
            SearchOutcome {
                success: true,
                answer: format!("answer for {query}"),
                sources: vec![Source {
                    name: "Wiki".into(),
                    url: "https://en.wikipedia.org/wiki/Mashhad".into(),
                }],
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn test_missing_key_reports_failure() {
        let section = SearchSection {
            api_key: None,
            ..SearchSection::default()
        };
        let mut search = TavilySearch::from_config(&section);
        // 环境变量里可能有真实 Key，这里强制清空
        search.api_key = None;
        let outcome = search.search("mashhad weather").await;
        assert!(!outcome.success);
        assert!(outcome.sources.is_empty());
        assert!(outcome.error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_failure() {
        let section = SearchSection {
            api_key: Some("tvly-test".into()),
            endpoint: Some("http://127.0.0.1:9/search".into()),
            timeout_secs: 2,
            ..SearchSection::default()
        };
        let outcome = TavilySearch::from_config(&section).search("x").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_tool_wraps_provider() {
        let tool = WebSearchTool::new(Arc::new(Canned));
        let out = tool
            .execute(serde_json::json!({"query": "mashhad"}))
            .await
            .unwrap();
        let parsed: SearchOutcome = serde_json::from_str(&out).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.answer, "answer for mashhad");
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }
}
