use std::sync::Arc;

use lexi_core::{
    evaluation::AnswerInput,
    model::{Exercise, LessonId, SessionProgress, UserId},
    session::{AnswerOutcome, SessionEngine},
    settings::SessionSettings,
};
use storage::repository::LessonRepository;
use tracing::{debug, error, info, warn};

use super::service::{ActiveSession, FinishedSession};
use crate::Clock;
use crate::error::SessionError;
use crate::mastery_service::MasteryService;
use crate::schedule_service::ScheduleService;

/// Result of one step (answer or acknowledgement) in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnswerResult {
    pub outcome: AnswerOutcome,
    pub progress: SessionProgress,
    /// Set on the step that ended the session, once its results are committed.
    pub finished: Option<FinishedSession>,
}

/// Orchestrates session start, answering and the final mastery commit.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    settings: SessionSettings,
    lessons: Arc<dyn LessonRepository>,
    mastery: MasteryService,
    schedule: Option<ScheduleService>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: SessionSettings,
        lessons: Arc<dyn LessonRepository>,
        mastery: MasteryService,
    ) -> Self {
        Self {
            clock,
            settings,
            lessons,
            mastery,
            schedule: None,
        }
    }

    /// Recompute the user's schedule after every committed session.
    #[must_use]
    pub fn with_schedule(mut self, schedule: ScheduleService) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Start a session over a stored lesson, applying its overrides.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the lesson cannot be loaded and
    /// `SessionError::Engine` if it has no exercises.
    pub async fn start_lesson(
        &self,
        user: &UserId,
        lesson_id: LessonId,
    ) -> Result<ActiveSession, SessionError> {
        let lesson = self.lessons.get_lesson(lesson_id).await?;
        let engine = SessionEngine::start_lesson(lesson, &self.settings, self.clock.now())?;
        info!(
            user = %user,
            session = %engine.id(),
            lesson = %lesson_id,
            exercises = engine.progress().total,
            lives = engine.lives_remaining(),
            "session started"
        );
        Ok(ActiveSession::new(user.clone(), Some(lesson_id), engine))
    }

    /// Start a session over an ad-hoc exercise list.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Engine` for an empty list.
    pub fn start(
        &self,
        user: &UserId,
        exercises: Vec<Exercise>,
    ) -> Result<ActiveSession, SessionError> {
        let engine = SessionEngine::start(exercises, &self.settings, self.clock.now())?;
        info!(
            user = %user,
            session = %engine.id(),
            exercises = engine.progress().total,
            lives = engine.lives_remaining(),
            "session started"
        );
        Ok(ActiveSession::new(user.clone(), None, engine))
    }

    /// Submit an answer for the current exercise.
    ///
    /// When the answer ends the session (last life lost), results are
    /// committed before returning.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Engine` for invalid transitions or malformed
    /// input, and `SessionError::Mastery` if the final commit fails. A failed
    /// commit can be retried with [`SessionLoopService::finalize`].
    pub async fn submit_answer(
        &self,
        session: &mut ActiveSession,
        input: &AnswerInput,
    ) -> Result<SessionAnswerResult, SessionError> {
        let outcome = session
            .engine_mut()
            .submit_answer(input, self.clock.now())?;
        if let AnswerOutcome::Judged {
            correct,
            lives_remaining,
            ..
        } = &outcome
        {
            debug!(
                session = %session.engine().id(),
                correct,
                lives_remaining,
                "answer judged"
            );
        }
        self.step_result(session, outcome).await
    }

    /// Move past the judged exercise.
    ///
    /// # Errors
    ///
    /// Same as [`SessionLoopService::submit_answer`].
    pub async fn acknowledge(
        &self,
        session: &mut ActiveSession,
    ) -> Result<SessionAnswerResult, SessionError> {
        let status = session.engine_mut().acknowledge(self.clock.now())?;
        self.step_result(session, AnswerOutcome::Advanced { status })
            .await
    }

    /// Commit a terminal session's results, or return the earlier commit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` while the session is running and
    /// `SessionError::Mastery` if persistence fails.
    pub async fn finalize(
        &self,
        session: &mut ActiveSession,
    ) -> Result<FinishedSession, SessionError> {
        if let Some(done) = session.finished() {
            return Ok(done.clone());
        }
        if !session.is_over() {
            return Err(SessionError::NotFinished);
        }

        let outcome = session.engine().outcome()?;
        let updates = match self.mastery.apply_results(session.user(), &outcome.results).await {
            Ok(updates) => updates,
            Err(err) => {
                error!(
                    session = %outcome.session_id,
                    error = %err,
                    "session results not committed"
                );
                return Err(err.into());
            }
        };
        info!(
            user = %session.user(),
            session = %outcome.session_id,
            status = outcome.status.as_str(),
            words = outcome.results.len(),
            xp = outcome.rewards.xp,
            gems = outcome.rewards.gems,
            "session finished"
        );

        if let Some(schedule) = &self.schedule {
            if let Err(err) = schedule.refresh(session.user()).await {
                warn!(user = %session.user(), error = %err, "schedule refresh failed");
            }
        }

        let finished = FinishedSession { outcome, updates };
        session.set_finished(finished.clone());
        Ok(finished)
    }

    async fn step_result(
        &self,
        session: &mut ActiveSession,
        outcome: AnswerOutcome,
    ) -> Result<SessionAnswerResult, SessionError> {
        let finished = if session.is_over() {
            Some(self.finalize(session).await?)
        } else {
            None
        };
        Ok(SessionAnswerResult {
            outcome,
            progress: session.progress(),
            finished,
        })
    }
}
