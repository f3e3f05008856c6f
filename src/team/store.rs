//! 运行记录持久化
//!
//! 单文件 JSON：完整消息（含序号、时间与结构化校验结果）。旧文件缺少结构化字段时，
//! 校验消息仍可通过正文标记还原，所以读回的记录可以直接交给选择器。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::{Message, Transcript};
use crate::team::conversation::TeamRun;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transcript io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcript is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 写盘格式
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedRun {
    pub run_id: Uuid,
    pub outcome: String,
    pub completed: bool,
    pub messages: Vec<Message>,
}

#[derive(Debug)]
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入整次运行；父目录不存在时自动创建
    pub fn save(&self, run: &TeamRun) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let saved = SavedRun {
            run_id: run.run_id,
            outcome: run.outcome.to_string(),
            completed: run.is_complete(),
            messages: run.transcript.messages().to_vec(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&saved)?).map_err(|e| self.io(e))?;
        tracing::info!(path = %self.path.display(), messages = saved.messages.len(), "transcript saved");
        Ok(())
    }

    pub fn load(&self) -> Result<SavedRun, StoreError> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| self.io(e))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 只取消息，序号按文件中的顺序重排
    pub fn load_transcript(&self) -> Result<Transcript, StoreError> {
        Ok(Transcript::from(self.load()?.messages))
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AgentRole;
    use crate::schema::{validate, SchemaKind, ValidationOutcome};
    use crate::team::conversation::RunOutcome;
    use crate::team::selector::{Turn, TurnSelector};

    fn sample_run() -> TeamRun {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("Isfahan, 2 days"));
        transcript.push(Message::from_agent(AgentRole::Researcher, "{\"findings\": []}"));
        transcript.push(Message::validation(validate(
            "{\"findings\": []}",
            Some(SchemaKind::ResearchReport),
        )));
        TeamRun {
            run_id: Uuid::new_v4(),
            transcript,
            outcome: RunOutcome::BudgetExhausted { messages: 3 },
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("runs/latest.json"));
        let run = sample_run();
        store.save(&run).unwrap();

        let saved = store.load().unwrap();
        assert_eq!(saved.run_id, run.run_id);
        assert!(!saved.completed);
        assert!(saved.outcome.contains("budget"));

        let transcript = store.load_transcript().unwrap();
        assert_eq!(transcript.len(), 3);
        assert!(matches!(
            transcript.last().and_then(|m| m.validation_outcome()),
            Some(ValidationOutcome::Failure { schema: SchemaKind::ResearchReport, .. })
        ));
        assert_eq!(
            TurnSelector::new().select(transcript.messages()),
            Turn::Speak(AgentRole::Researcher)
        );
    }

    #[test]
    fn test_plain_text_validator_messages_still_route() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let legacy = serde_json::json!({
            "run_id": Uuid::nil(),
            "outcome": "completed",
            "completed": false,
            "messages": [
                {"source": "user", "content": "Shiraz", "ordinal": 0, "created_at": "2025-01-01T00:00:00Z"},
                {"source": "planner", "content": "{}", "ordinal": 1, "created_at": "2025-01-01T00:00:01Z"},
                {"source": "validator", "content": "VALIDATION_SUCCESS: The JSON is valid and conforms to the ItineraryPlan schema.", "ordinal": 2, "created_at": "2025-01-01T00:00:02Z"}
            ]
        });
        std::fs::write(&path, legacy.to_string()).unwrap();

        let transcript = TranscriptStore::new(&path).load_transcript().unwrap();
        assert_eq!(
            TurnSelector::new().select(transcript.messages()),
            Turn::Speak(AgentRole::Writer)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TranscriptStore::new(dir.path().join("nope.json")).load().unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
