//! 团队构建器：按配置组装 LLM 后端、搜索工具与四个成员
//!
//! 每个生产者可以共享同一个后端（默认），也可以在测试中单独注入；--mock 时每个角色用离线客户端。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::prompts::{planner_prompt, researcher_prompt, WRITER_PROMPT};
use crate::agents::{AgentRoster, LlmAgent, ToolLoop, ValidatorAgent};
use crate::config::AppConfig;
use crate::core::{AgentRole, ConfigError};
use crate::llm::{create_gemini_client, CompletionOptions, LlmClient, MockLlmClient};
use crate::team::conversation::TravelTeam;
use crate::team::selector::TurnSelector;
use crate::team::termination::Termination;
use crate::tools::{SearchProvider, TavilySearch, ToolExecutor, ToolRegistry, WebSearchTool};

pub struct TeamBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    role_llms: HashMap<AgentRole, Arc<dyn LlmClient>>,
    search: Option<Arc<dyn SearchProvider>>,
    mock: bool,
}

impl TeamBuilder {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            role_llms: HashMap::new(),
            search: None,
            mock: false,
        }
    }

    /// 所有生产者共用的后端（不设置时按 [llm] 段创建 Gemini 客户端）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 单独给某个角色指定后端，优先于 with_llm
    pub fn with_role_llm(mut self, role: AgentRole, llm: Arc<dyn LlmClient>) -> Self {
        self.role_llms.insert(role, llm);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// 离线模式：不需要任何 API Key
    pub fn mock(mut self, enable: bool) -> Self {
        self.mock = enable;
        self
    }

    pub fn build_tool_registry(&self) -> ToolRegistry {
        let provider: Arc<dyn SearchProvider> = match &self.search {
            Some(search) => search.clone(),
            None => Arc::new(TavilySearch::from_config(&self.config.search)),
        };
        let mut tools = ToolRegistry::new();
        tools.register(WebSearchTool::new(provider));
        tools
    }

    pub fn build_termination(&self) -> Termination {
        Termination::new()
            .with_stop_keyword(self.config.team.stop_keyword.clone())
            .with_max_messages(self.config.team.max_messages)
    }

    pub fn build_selector(&self) -> TurnSelector {
        TurnSelector::new().with_max_stage_retries(self.config.team.max_stage_retries)
    }

    pub fn build(self) -> Result<TravelTeam, ConfigError> {
        self.config.validate()?;

        let producers = [AgentRole::Researcher, AgentRole::Planner, AgentRole::Writer];
        let needs_shared = producers.iter().any(|r| !self.role_llms.contains_key(r));
        let shared: Option<Arc<dyn LlmClient>> = match &self.llm {
            Some(llm) => Some(llm.clone()),
            None if self.mock || !needs_shared => None,
            None => {
                tracing::info!(model = %self.config.llm.model, "using OpenAI-compatible backend");
                Some(Arc::new(create_gemini_client(&self.config.llm)?))
            }
        };
        let backend = |role: AgentRole| -> Arc<dyn LlmClient> {
            if let Some(llm) = self.role_llms.get(&role) {
                return llm.clone();
            }
            match &shared {
                Some(llm) => llm.clone(),
                None => Arc::new(MockLlmClient::for_role(role)),
            }
        };

        let llm_cfg = &self.config.llm;
        let timeout = Duration::from_secs(llm_cfg.timeout_secs);
        let options = |temperature: f32| {
            CompletionOptions::default()
                .with_temperature(temperature)
                .with_max_tokens(llm_cfg.max_tokens)
        };

        let registry = self.build_tool_registry();
        let tools_json = registry.to_schema_json();
        let executor = ToolExecutor::new(registry, self.config.search.timeout_secs);

        let researcher = LlmAgent::new(
            AgentRole::Researcher,
            "Gathers live travel facts with web search and reports them as JSON.",
            researcher_prompt(Some(&tools_json)),
            backend(AgentRole::Researcher),
        )
        .with_options(options(llm_cfg.researcher_temperature()))
        .with_timeout(timeout)
        .with_tools(ToolLoop::new(executor, self.config.search.max_tool_rounds));

        let planner = LlmAgent::new(
            AgentRole::Planner,
            "Turns validated research into a day-by-day itinerary JSON.",
            planner_prompt(),
            backend(AgentRole::Planner),
        )
        .with_options(options(llm_cfg.planner_temperature()))
        .with_timeout(timeout);

        let writer = LlmAgent::new(
            AgentRole::Writer,
            "Writes the final Persian travel brief from the validated itinerary.",
            WRITER_PROMPT,
            backend(AgentRole::Writer),
        )
        .with_options(options(llm_cfg.writer_temperature()))
        .with_timeout(timeout);

        // 共享后端只计一次用量
        let mut backends: Vec<Arc<dyn LlmClient>> = Vec::new();
        for llm in producers.map(&backend) {
            if !backends.iter().any(|b| Arc::ptr_eq(b, &llm)) {
                backends.push(llm);
            }
        }

        let roster = AgentRoster::new()
            .with(researcher)
            .with(planner)
            .with(writer)
            .with(ValidatorAgent::new());
        for (name, description) in roster.describe() {
            tracing::debug!(agent = %name, %description, "registered");
        }

        let selector = self.build_selector();
        let termination = self.build_termination();
        Ok(TravelTeam::new(roster, selector, termination).with_backends(backends))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_build_needs_no_key() {
        let team = TeamBuilder::from_config(AppConfig::default()).mock(true).build();
        let team = team.unwrap();
        assert!(team.roster().is_complete());
    }

    struct Metered;

    #[async_trait::async_trait]
    impl LlmClient for Metered {
        async fn complete(
            &self,
            _messages: &[crate::llm::ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String, crate::llm::LlmError> {
            Ok(String::new())
        }

        fn token_usage(&self) -> (u64, u64, u64) {
            (100, 20, 120)
        }
    }

    #[test]
    fn test_shared_backend_usage_counted_once() {
        let team = TeamBuilder::from_config(AppConfig::default())
            .with_llm(Arc::new(Metered))
            .build()
            .unwrap();
        assert_eq!(team.token_usage(), (100, 20, 120));

        let team = TeamBuilder::from_config(AppConfig::default())
            .with_llm(Arc::new(Metered))
            .with_role_llm(AgentRole::Writer, Arc::new(Metered))
            .build()
            .unwrap();
        assert_eq!(team.token_usage(), (200, 40, 240));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = AppConfig::default();
        cfg.team.max_messages = 0;
        assert!(matches!(
            TeamBuilder::from_config(cfg).mock(true).build(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_termination_from_config() {
        let mut cfg = AppConfig::default();
        cfg.team.max_messages = 3;
        let builder = TeamBuilder::from_config(cfg);
        assert_eq!(builder.build_termination().max_messages(), Some(3));
        assert_eq!(builder.build_selector().max_stage_retries(), Some(3));
        assert_eq!(builder.build_tool_registry().tool_names(), vec!["web_search"]);
    }
}
