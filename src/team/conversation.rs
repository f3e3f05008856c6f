//! 对话主循环
//!
//! 追加首条消息 → 检查终止 → 循环 { 选择发言者 → 调用 Agent → 追加回复 → 检查终止 }。
//! 严格串行：一次调用结束后才做下一次决策。任何出口都带回截至当时的完整记录。

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::agents::AgentRoster;
use crate::core::{AgentError, AgentRole, Message, Speaker, Transcript};
use crate::llm::LlmClient;
use crate::schema::{parse_itinerary_plan, ItineraryPlan, ValidationOutcome};
use crate::team::selector::{Turn, TurnSelector};
use crate::team::termination::{StopReason, Termination};

/// 一次运行的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 写作者已交付，选择器给出终止信号
    Completed,
    StopKeyword { ordinal: usize },
    /// 消息数达到上限，流程未走完
    BudgetExhausted { messages: usize },
    RetriesExhausted { role: AgentRole, attempts: usize },
    /// 后端或工具失败；error 为面向用户的诊断
    AgentFailed { role: AgentRole, error: String },
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::StopKeyword { ordinal } => {
                write!(f, "stopped by stop keyword in message #{ordinal}")
            }
            RunOutcome::BudgetExhausted { messages } => {
                write!(f, "message budget exhausted after {messages} messages (incomplete)")
            }
            RunOutcome::RetriesExhausted { role, attempts } => {
                write!(f, "{role} failed validation {attempts} times, giving up")
            }
            RunOutcome::AgentFailed { role, error } => write!(f, "{role} failed: {error}"),
        }
    }
}

impl From<StopReason> for RunOutcome {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::StopKeyword { ordinal } => RunOutcome::StopKeyword { ordinal },
            StopReason::MaxMessages { count } => RunOutcome::BudgetExhausted { messages: count },
        }
    }
}

/// 运行结果：记录 + 结束方式
#[derive(Debug, Clone)]
pub struct TeamRun {
    pub run_id: Uuid,
    pub transcript: Transcript,
    pub outcome: RunOutcome,
}

impl TeamRun {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    /// 写作者的最后一条消息（波斯语行程简报）
    pub fn final_brief(&self) -> Option<&str> {
        self.last_from(AgentRole::Writer).map(|m| m.content())
    }

    /// 最近一份通过校验的行程
    pub fn itinerary(&self) -> Option<ItineraryPlan> {
        let messages = self.transcript.messages();
        messages.iter().enumerate().rev().find_map(|(i, m)| {
            if m.source().role() != Some(AgentRole::Planner) {
                return None;
            }
            let accepted = matches!(
                messages.get(i + 1).and_then(|next| next.validation_outcome()),
                Some(ValidationOutcome::Success { .. })
            );
            accepted.then(|| parse_itinerary_plan(m.content()).ok()).flatten()
        })
    }

    /// 某个角色在本次运行中发言的次数
    pub fn invocations(&self, role: AgentRole) -> usize {
        self.transcript.count_from(&Speaker::Agent(role))
    }

    fn last_from(&self, role: AgentRole) -> Option<&Message> {
        self.transcript
            .messages()
            .iter()
            .rev()
            .find(|m| m.source().role() == Some(role))
    }
}

/// 旅行规划团队：名册 + 选择器 + 终止条件
pub struct TravelTeam {
    roster: AgentRoster,
    selector: TurnSelector,
    termination: Termination,
    backends: Vec<Arc<dyn LlmClient>>,
}

impl TravelTeam {
    pub fn new(roster: AgentRoster, selector: TurnSelector, termination: Termination) -> Self {
        Self {
            roster,
            selector,
            termination,
            backends: Vec::new(),
        }
    }

    /// 运行结束时汇总这些后端的 token 用量；同一个后端只应出现一次
    pub fn with_backends(mut self, backends: Vec<Arc<dyn LlmClient>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    /// 累计 token 用量：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.backends
            .iter()
            .map(|b| b.token_usage())
            .fold((0, 0, 0), |acc, u| (acc.0 + u.0, acc.1 + u.1, acc.2 + u.2))
    }

    pub async fn run(&self, initial: Message) -> TeamRun {
        let mut transcript = Transcript::new();
        transcript.push(initial);
        self.resume(transcript).await
    }

    /// 从已有记录继续（例如磁盘上保存的上一次运行）；下一位发言者仍由记录推导
    pub async fn resume(&self, transcript: Transcript) -> TeamRun {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("team_run", %run_id);
        let (transcript, outcome) = self.drive(transcript).instrument(span.clone()).await;
        span.in_scope(|| {
            let (prompt, completion, total) = self.token_usage();
            tracing::info!(prompt, completion, total, outcome = %outcome, "token usage");
        });
        TeamRun {
            run_id,
            transcript,
            outcome,
        }
    }

    async fn drive(&self, mut transcript: Transcript) -> (Transcript, RunOutcome) {
        tracing::info!(
            messages = transcript.len(),
            max_messages = ?self.termination.max_messages(),
            max_stage_retries = ?self.selector.max_stage_retries(),
            "run started"
        );

        if let Some(outcome) = self.finish_check(&transcript) {
            return (transcript, outcome);
        }

        loop {
            let role = match self.selector.select(transcript.messages()) {
                Turn::Speak(role) => role,
                Turn::Terminal => {
                    tracing::info!(messages = transcript.len(), "run completed");
                    return (transcript, RunOutcome::Completed);
                }
                Turn::RetriesExhausted { role, attempts } => {
                    return (transcript, RunOutcome::RetriesExhausted { role, attempts });
                }
            };

            let reply = match self.invoke(role, &transcript).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(%role, error = %e, "agent failed, ending run");
                    let outcome = RunOutcome::AgentFailed {
                        role,
                        error: e.diagnostic(),
                    };
                    return (transcript, outcome);
                }
            };

            let ordinal = transcript.push(reply);
            tracing::info!(%role, ordinal, "message appended");

            if let Some(outcome) = self.finish_check(&transcript) {
                return (transcript, outcome);
            }
        }
    }

    /// 终止条件命中时的结局；写作者已交付时算完成，而不是预算耗尽或停止词
    fn finish_check(&self, transcript: &Transcript) -> Option<RunOutcome> {
        let reason = transcript
            .last()
            .and_then(|newest| self.termination.check(transcript, newest))?;
        if self.selector.select(transcript.messages()) == Turn::Terminal {
            tracing::info!(?reason, "termination condition met on the final message");
            return Some(RunOutcome::Completed);
        }
        tracing::info!(?reason, "termination condition met");
        Some(reason.into())
    }

    async fn invoke(&self, role: AgentRole, transcript: &Transcript) -> Result<Message, AgentError> {
        let agent = self
            .roster
            .get(role)
            .ok_or_else(|| AgentError::MissingAgent(role.to_string()))?;
        let reply = agent.invoke(transcript.messages()).await?;
        if reply.source().role() != Some(role) {
            tracing::warn!(%role, source = %reply.source(), "agent replied under another name");
        }
        Ok(reply)
    }
}
