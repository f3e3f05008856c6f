//! 团队编排：发言选择、终止条件、对话主循环、构建与记录持久化

pub mod builder;
pub mod conversation;
pub mod selector;
pub mod store;
pub mod termination;

pub use builder::TeamBuilder;
pub use conversation::{RunOutcome, TeamRun, TravelTeam};
pub use selector::{Phase, Turn, TurnSelector};
pub use store::{SavedRun, StoreError, TranscriptStore};
pub use termination::{StopReason, Termination};
