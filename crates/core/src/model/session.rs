use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::exercise::ExerciseType;
use crate::model::ids::{ExerciseId, WordId};

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for an answer to exercise `index`.
    Presenting(usize),
    /// Exercise `index` was judged; waiting for acknowledgement.
    Evaluating(usize),
    Complete,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Presenting(_) => "presenting",
            SessionStatus::Evaluating(_) => "evaluating",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        }
    }
}

/// One judged answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub exercise_id: ExerciseId,
    pub word_id: WordId,
    pub kind: ExerciseType,
    pub correct: bool,
    pub submitted_at: DateTime<Utc>,
    pub latency: Duration,
}

/// Rewards granted when a session completes. Zero for failed sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRewards {
    pub xp: u32,
    pub gems: u32,
}

impl SessionRewards {
    /// `floor(base * correct / total)` for both currencies.
    #[must_use]
    pub fn scaled(base_xp: u32, base_gems: u32, correct: usize, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        let scale = |base: u32| -> u32 {
            let scaled = u64::from(base) * correct.min(total) as u64 / total as u64;
            u32::try_from(scaled).unwrap_or(u32::MAX)
        };
        Self {
            xp: scale(base_xp),
            gems: scale(base_gems),
        }
    }
}

/// Read-only view of session progress for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub remaining: usize,
    pub lives_remaining: u32,
    pub status: SessionStatus,
}
