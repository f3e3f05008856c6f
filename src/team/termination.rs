//! 终止条件：停止词与消息总数上限
//!
//! 每追加一条消息检查一次；任一条件命中即结束，已有记录原样返回。

use crate::core::{Message, Transcript};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 某条消息正文包含停止词
    StopKeyword { ordinal: usize },
    /// 消息总数达到上限
    MaxMessages { count: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Termination {
    stop_keyword: Option<String>,
    max_messages: Option<usize>,
}

impl Termination {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空字符串表示不启用
    pub fn with_stop_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        self.stop_keyword = (!keyword.is_empty()).then_some(keyword);
        self
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    pub fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    /// 在 newest 已追加进 transcript 之后调用
    pub fn check(&self, transcript: &Transcript, newest: &Message) -> Option<StopReason> {
        if let Some(keyword) = &self.stop_keyword {
            if newest.content().contains(keyword.as_str()) {
                return Some(StopReason::StopKeyword {
                    ordinal: newest.ordinal(),
                });
            }
        }
        match self.max_messages {
            Some(max) if transcript.len() >= max => Some(StopReason::MaxMessages {
                count: transcript.len(),
            }),
            _ => None,
        }
    }
}
