//! 发言选择器（团队的主控状态机）
//!
//! select(history) 是历史记录的纯函数：先由 Phase::derive 推导当前阶段，再查转移表得到下一位发言者。
//! 不保存任何状态，同一历史多次调用结果相同。
//!
//! 正常路径：researcher → validator → planner → validator → writer → 结束。
//! 校验失败时回到对应生产者；可选的每阶段重试上限从历史中现算，不额外存计数器。

use crate::core::{AgentRole, Message, Speaker};
use crate::schema::{SchemaKind, ValidationOutcome};

/// 选择结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Speak(AgentRole),
    /// 写作完成，流程结束
    Terminal,
    /// 某阶段校验失败次数超过上限
    RetriesExhausted { role: AgentRole, attempts: usize },
}

/// 从最后一条消息推导出的阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// 历史为空或只有一条消息
    Bootstrap,
    UserInput,
    /// 生产者刚交付，等待校验
    AwaitingValidation(SchemaKind),
    Accepted(SchemaKind),
    Rejected(SchemaKind),
    /// 校验者的消息里认不出 schema（含 Skipped）
    Unrecognized,
    Finished,
    /// 未知发送方
    Unknown(String),
}

impl Phase {
    pub fn derive(history: &[Message]) -> Phase {
        let last = match history {
            [] | [_] => return Phase::Bootstrap,
            [.., last] => last,
        };

        match last.source() {
            Speaker::User => Phase::UserInput,
            Speaker::Agent(AgentRole::Researcher) => {
                Phase::AwaitingValidation(SchemaKind::ResearchReport)
            }
            Speaker::Agent(AgentRole::Planner) => {
                Phase::AwaitingValidation(SchemaKind::ItineraryPlan)
            }
            Speaker::Agent(AgentRole::Validator) => match last.validation_outcome() {
                Some(ValidationOutcome::Success { schema }) => Phase::Accepted(schema),
                Some(ValidationOutcome::Failure { schema, .. }) => Phase::Rejected(schema),
                Some(ValidationOutcome::Skipped { .. }) | None => Phase::Unrecognized,
            },
            Speaker::Agent(AgentRole::Writer) => Phase::Finished,
            Speaker::Other(name) => Phase::Unknown(name.clone()),
        }
    }
}

/// 选择器；max_stage_retries 为 None 时只靠外部消息上限约束重试
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnSelector {
    max_stage_retries: Option<usize>,
}

impl TurnSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 视为不限
    pub fn with_max_stage_retries(mut self, retries: usize) -> Self {
        self.max_stage_retries = (retries > 0).then_some(retries);
        self
    }

    pub fn max_stage_retries(&self) -> Option<usize> {
        self.max_stage_retries
    }

    pub fn select(&self, history: &[Message]) -> Turn {
        let phase = Phase::derive(history);
        let turn = self.transition(&phase, history);
        tracing::debug!(?phase, ?turn, messages = history.len(), "turn selected");
        turn
    }

    fn transition(&self, phase: &Phase, history: &[Message]) -> Turn {
        match phase {
            Phase::Bootstrap | Phase::UserInput => Turn::Speak(AgentRole::Researcher),
            Phase::AwaitingValidation(_) => Turn::Speak(AgentRole::Validator),
            Phase::Accepted(SchemaKind::ResearchReport) => Turn::Speak(AgentRole::Planner),
            Phase::Accepted(SchemaKind::ItineraryPlan) => Turn::Speak(AgentRole::Writer),
            Phase::Rejected(schema) => self.retry(*schema, history),
            Phase::Unrecognized => {
                tracing::warn!("validator message names no known schema, restarting research");
                Turn::Speak(AgentRole::Researcher)
            }
            Phase::Finished => Turn::Terminal,
            Phase::Unknown(name) => {
                tracing::warn!(source = %name, "unrecognized speaker, restarting research");
                Turn::Speak(AgentRole::Researcher)
            }
        }
    }

    fn retry(&self, schema: SchemaKind, history: &[Message]) -> Turn {
        let role = schema.producer();
        let Some(limit) = self.max_stage_retries else {
            return Turn::Speak(role);
        };
        let attempts = failures_since_last_user(schema, history);
        if attempts > limit {
            tracing::warn!(%role, attempts, limit, "stage retries exhausted");
            Turn::RetriesExhausted { role, attempts }
        } else {
            Turn::Speak(role)
        }
    }
}

/// 最近一次用户输入之后，某个 schema 的校验失败次数
fn failures_since_last_user(schema: SchemaKind, history: &[Message]) -> usize {
    let start = history
        .iter()
        .rposition(|m| *m.source() == Speaker::User)
        .map(|i| i + 1)
        .unwrap_or(0);
    history[start..]
        .iter()
        .filter(|m| *m.source() == Speaker::Agent(AgentRole::Validator))
        .filter_map(|m| m.validation_outcome())
        .filter(|o| matches!(o, ValidationOutcome::Failure { schema: s, .. } if *s == schema))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transcript;

    fn history(entries: &[(&str, &str)]) -> Vec<Message> {
        let mut t = Transcript::new();
        for (source, content) in entries {
            t.push(Message::new(*source, *content));
        }
        t.into_messages()
    }

    fn outcome(o: ValidationOutcome) -> Message {
        Message::validation(o)
    }

    fn failure(schema: SchemaKind) -> ValidationOutcome {
        ValidationOutcome::Failure {
            schema,
            reason: "- (root): the message content is not valid JSON".into(),
        }
    }

    #[test]
    fn test_bootstrap_selects_researcher() {
        let selector = TurnSelector::new();
        assert_eq!(selector.select(&[]), Turn::Speak(AgentRole::Researcher));
        for source in ["user", "writer", "validator", "planner", "stranger"] {
            let h = history(&[(source, "VALIDATION_SUCCESS ItineraryPlan")]);
            assert_eq!(selector.select(&h), Turn::Speak(AgentRole::Researcher), "{source}");
        }
    }

    #[test]
    fn test_user_input_restarts_research() {
        let h = history(&[("user", "plan a trip"), ("writer", "done"), ("user", "make it 3 days")]);
        assert_eq!(TurnSelector::new().select(&h), Turn::Speak(AgentRole::Researcher));
    }

    #[test]
    fn test_producers_go_through_validation_gate() {
        let selector = TurnSelector::new();
        for producer in ["researcher", "planner"] {
            let h = history(&[("user", "plan a trip"), (producer, "not even json")]);
            assert_eq!(selector.select(&h), Turn::Speak(AgentRole::Validator));
        }
    }

    #[test]
    fn test_success_advances_failure_retries() {
        let selector = TurnSelector::new();
        let cases = [
            (ValidationOutcome::Success { schema: SchemaKind::ResearchReport }, AgentRole::Planner),
            (failure(SchemaKind::ResearchReport), AgentRole::Researcher),
            (ValidationOutcome::Success { schema: SchemaKind::ItineraryPlan }, AgentRole::Writer),
            (failure(SchemaKind::ItineraryPlan), AgentRole::Planner),
        ];
        for (o, expected) in cases {
            let mut h = history(&[("user", "plan a trip"), ("researcher", "{}")]);
            h.push(outcome(o));
            assert_eq!(selector.select(&h), Turn::Speak(expected));
        }
    }

    #[test]
    fn test_text_markers_route_without_structured_outcome() {
        let selector = TurnSelector::new();
        let cases = [
            ("VALIDATION_SUCCESS: conforms to the ResearchReport schema.", AgentRole::Planner),
            ("VALIDATION_FAILURE: ResearchReport errors", AgentRole::Researcher),
            ("VALIDATION_SUCCESS: conforms to the ItineraryPlan schema.", AgentRole::Writer),
            ("VALIDATION_FAILURE: ItineraryPlan errors", AgentRole::Planner),
            ("VALIDATION_SKIPPED: No validation rule for sender 'writer'.", AgentRole::Researcher),
            ("no idea what happened", AgentRole::Researcher),
        ];
        for (text, expected) in cases {
            let h = history(&[("user", "plan a trip"), ("planner", "{}"), ("validator", text)]);
            assert_eq!(selector.select(&h), Turn::Speak(expected), "{text}");
        }
    }

    #[test]
    fn test_writer_terminates() {
        let h = history(&[("user", "plan a trip"), ("writer", "Day 1 ...")]);
        assert_eq!(TurnSelector::new().select(&h), Turn::Terminal);
    }

    #[test]
    fn test_unknown_speaker_falls_back_to_researcher() {
        let h = history(&[("user", "plan a trip"), ("critic", "hmm")]);
        assert_eq!(TurnSelector::new().select(&h), Turn::Speak(AgentRole::Researcher));
        assert_eq!(Phase::derive(&h), Phase::Unknown("critic".into()));
    }

    #[test]
    fn test_select_is_idempotent() {
        let selector = TurnSelector::new().with_max_stage_retries(2);
        let mut h = history(&[("user", "plan a trip"), ("researcher", "{")]);
        h.push(outcome(failure(SchemaKind::ResearchReport)));
        let first = selector.select(&h);
        let second = selector.select(&h);
        assert_eq!(first, second);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_retry_ceiling() {
        let selector = TurnSelector::new().with_max_stage_retries(1);
        let mut h = history(&[("user", "plan a trip"), ("researcher", "{")]);
        h.push(outcome(failure(SchemaKind::ResearchReport)));
        // 第一次失败：允许重试
        assert_eq!(selector.select(&h), Turn::Speak(AgentRole::Researcher));

        h.push(Message::new("researcher", "{"));
        h.push(outcome(failure(SchemaKind::ResearchReport)));
        assert_eq!(
            selector.select(&h),
            Turn::RetriesExhausted {
                role: AgentRole::Researcher,
                attempts: 2
            }
        );

        // 不设上限时永远回炉
        assert_eq!(TurnSelector::new().select(&h), Turn::Speak(AgentRole::Researcher));
        assert_eq!(
            TurnSelector::new().with_max_stage_retries(0).max_stage_retries(),
            None
        );
    }

    #[test]
    fn test_retry_count_is_per_stage_and_resets_on_user_input() {
        let selector = TurnSelector::new().with_max_stage_retries(1);
        let mut h = history(&[("user", "plan a trip"), ("researcher", "{")]);
        h.push(outcome(failure(SchemaKind::ResearchReport)));
        h.push(Message::new("researcher", "{}"));
        h.push(outcome(ValidationOutcome::Success { schema: SchemaKind::ResearchReport }));
        h.push(Message::new("planner", "{"));
        h.push(outcome(failure(SchemaKind::ItineraryPlan)));
        // 研究阶段的失败不计入规划阶段
        assert_eq!(selector.select(&h), Turn::Speak(AgentRole::Planner));

        let mut fresh = h.clone();
        fresh.push(Message::user("try again"));
        fresh.push(Message::new("planner", "{"));
        fresh.push(outcome(failure(SchemaKind::ItineraryPlan)));
        assert_eq!(selector.select(&fresh), Turn::Speak(AgentRole::Planner));
    }
}
