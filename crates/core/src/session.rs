//! Single exercise session under a lives budget.
//!
//! ```text
//! Presenting(i) --answer--> Evaluating(i) --ack--> Presenting(i+1) | Complete
//!        \--wrong answer, last life--> Failed
//! ```
//!
//! A `SessionEngine` is owned by one caller; every transition takes `&mut self`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::evaluation::{AnswerInput, EvaluationError, evaluate};
use crate::model::{
    AnswerRecord, Exercise, ExerciseType, Lesson, ReviewResult, ReviewResultError, SessionId,
    SessionProgress, SessionRewards, SessionStatus, WordId,
};
use crate::settings::SessionSettings;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while session is {}", .status.as_str())]
    InvalidTransition {
        status: SessionStatus,
        action: &'static str,
    },
    #[error("session needs at least one exercise")]
    EmptySessionInput,
    #[error("session needs at least one life")]
    InvalidLives,
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Result(#[from] ReviewResultError),
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What a call to `submit_answer` did.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// The answer was judged. `status` is `Evaluating(i)` or `Failed`.
    Judged {
        correct: bool,
        expected: String,
        explanation: Option<String>,
        lives_remaining: u32,
        status: SessionStatus,
    },
    /// The call acknowledged a judged exercise and moved on; input was ignored.
    Advanced { status: SessionStatus },
}

/// Final results of a terminal session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub answers: Vec<AnswerRecord>,
    pub results: Vec<ReviewResult>,
    pub rewards: SessionRewards,
}

impl SessionOutcome {
    #[must_use]
    pub fn completed(&self) -> bool {
        self.status == SessionStatus::Complete
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct SessionEngine {
    id: SessionId,
    exercises: Vec<Exercise>,
    settings: SessionSettings,
    status: SessionStatus,
    lives_remaining: u32,
    answers: Vec<AnswerRecord>,
    started_at: DateTime<Utc>,
    presented_at: DateTime<Utc>,
}

impl SessionEngine {
    /// Start at `Presenting(0)` with `settings.initial_lives()` lives.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptySessionInput` with no exercises and
    /// `SessionError::InvalidLives` when the lives budget is zero.
    pub fn start(
        exercises: Vec<Exercise>,
        settings: &SessionSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if exercises.is_empty() {
            return Err(SessionError::EmptySessionInput);
        }
        if settings.initial_lives() == 0 {
            return Err(SessionError::InvalidLives);
        }
        Ok(Self {
            id: SessionId::random(),
            exercises,
            settings: settings.clone(),
            status: SessionStatus::Presenting(0),
            lives_remaining: settings.initial_lives(),
            answers: Vec::new(),
            started_at: now,
            presented_at: now,
        })
    }

    /// Start a session for `lesson`, applying its lives and reward overrides.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::start`].
    pub fn start_lesson(
        lesson: Lesson,
        base: &SessionSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let settings = lesson.effective_settings(base);
        Self::start(lesson.into_exercises(), &settings, now)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn lives_remaining(&self) -> u32 {
        self.lives_remaining
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// Exercise being presented or evaluated; `None` once the session ended.
    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        match self.status {
            SessionStatus::Presenting(i) | SessionStatus::Evaluating(i) => self.exercises.get(i),
            SessionStatus::Complete | SessionStatus::Failed => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.answers.len();
        SessionProgress {
            total: self.exercises.len(),
            answered,
            correct: self.correct_count(),
            remaining: self.exercises.len().saturating_sub(answered),
            lives_remaining: self.lives_remaining,
            status: self.status,
        }
    }

    /// Judge an answer for the presented exercise, or acknowledge the one
    /// already judged.
    ///
    /// A wrong answer costs one life; losing the last life fails the session
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` once the session ended and
    /// `SessionError::Evaluation` for malformed input. Neither changes state.
    pub fn submit_answer(
        &mut self,
        input: &AnswerInput,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        let index = match self.status {
            SessionStatus::Presenting(i) => i,
            SessionStatus::Evaluating(_) => {
                let status = self.acknowledge(now)?;
                return Ok(AnswerOutcome::Advanced { status });
            }
            status @ (SessionStatus::Complete | SessionStatus::Failed) => {
                return Err(SessionError::InvalidTransition {
                    status,
                    action: "submit an answer",
                });
            }
        };
        let Some(exercise) = self.exercises.get(index) else {
            return Err(SessionError::EmptySessionInput);
        };

        let correct = evaluate(exercise, input)?;
        let latency = (now - self.presented_at).to_std().unwrap_or_default();
        let expected = exercise.correct_answer().to_owned();
        let explanation = exercise.explanation().map(str::to_owned);
        self.answers.push(AnswerRecord {
            exercise_id: exercise.id(),
            word_id: exercise.word_id().clone(),
            kind: exercise.kind(),
            correct,
            submitted_at: now,
            latency,
        });

        if !correct {
            self.lives_remaining = self.lives_remaining.saturating_sub(1);
        }
        self.status = if self.lives_remaining == 0 {
            SessionStatus::Failed
        } else {
            SessionStatus::Evaluating(index)
        };

        Ok(AnswerOutcome::Judged {
            correct,
            expected,
            explanation,
            lives_remaining: self.lives_remaining,
            status: self.status,
        })
    }

    /// Move past a judged exercise.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is in
    /// `Evaluating`.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        let SessionStatus::Evaluating(index) = self.status else {
            return Err(SessionError::InvalidTransition {
                status: self.status,
                action: "acknowledge",
            });
        };
        let next = index + 1;
        self.status = if next < self.exercises.len() {
            self.presented_at = now;
            SessionStatus::Presenting(next)
        } else {
            SessionStatus::Complete
        };
        Ok(self.status)
    }

    /// Per-word results and rewards of a finished session.
    ///
    /// Failed sessions still return results for every answered exercise, with
    /// zero rewards.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` while the session is running.
    pub fn outcome(&self) -> Result<SessionOutcome, SessionError> {
        if !self.status.is_terminal() {
            return Err(SessionError::InvalidTransition {
                status: self.status,
                action: "collect the outcome",
            });
        }
        let rewards = if self.status == SessionStatus::Complete {
            SessionRewards::scaled(
                self.settings.base_xp(),
                self.settings.base_gems(),
                self.correct_count(),
                self.exercises.len(),
            )
        } else {
            SessionRewards::default()
        };
        Ok(SessionOutcome {
            session_id: self.id,
            status: self.status,
            started_at: self.started_at,
            answers: self.answers.clone(),
            results: self.word_results()?,
            rewards,
        })
    }

    fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.correct).count()
    }

    fn word_results(&self) -> Result<Vec<ReviewResult>, ReviewResultError> {
        let mut by_word: BTreeMap<&WordId, Vec<&AnswerRecord>> = BTreeMap::new();
        for answer in &self.answers {
            by_word.entry(&answer.word_id).or_default().push(answer);
        }

        let mut results = Vec::with_capacity(by_word.len());
        for (word_id, answers) in by_word {
            let attempts = answers.len();
            let correct = answers.iter().filter(|a| a.correct).count();
            #[allow(clippy::cast_precision_loss)]
            let accuracy = correct as f64 / attempts as f64;
            let latency: Duration = answers.iter().map(|a| a.latency).sum();
            let reviewed_at = answers
                .iter()
                .map(|a| a.submitted_at)
                .max()
                .unwrap_or(self.started_at);
            let mistakes: Vec<&'static str> = answers
                .iter()
                .filter(|a| !a.correct)
                .map(|a| a.kind.as_str())
                .collect();
            let practiced: Vec<ExerciseType> = answers.iter().map(|a| a.kind).collect();

            let result = ReviewResult::new(word_id.clone(), accuracy, reviewed_at)?
                .with_latency(latency)
                .with_attempts(u32::try_from(attempts).unwrap_or(u32::MAX))
                .with_practiced(practiced)
                .with_mistakes(mistakes)?
                .with_reinforcement(accuracy < self.settings.reinforcement_threshold());
            results.push(result);
        }
        Ok(results)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
