use lexi_core::{
    mastery::MasteryUpdate,
    model::{Exercise, LessonId, SessionProgress, SessionStatus, UserId},
    session::{SessionEngine, SessionOutcome},
};

//
// ─── FINISHED SESSION ──────────────────────────────────────────────────────────
//

/// A terminal session whose results were committed to mastery storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub outcome: SessionOutcome,
    pub updates: Vec<MasteryUpdate>,
}

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

/// A user's running session: the engine plus what the services layer needs
/// to commit it exactly once.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    user: UserId,
    lesson_id: Option<LessonId>,
    engine: SessionEngine,
    finished: Option<FinishedSession>,
}

impl ActiveSession {
    pub(crate) fn new(user: UserId, lesson_id: Option<LessonId>, engine: SessionEngine) -> Self {
        Self {
            user,
            lesson_id,
            engine,
            finished: None,
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn lesson_id(&self) -> Option<LessonId> {
        self.lesson_id
    }

    #[must_use]
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut SessionEngine {
        &mut self.engine
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.engine.current_exercise()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.engine.progress()
    }

    /// The engine reached `Complete` or `Failed`.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.engine.status().is_terminal()
    }

    /// Committed results, once the session is over and persisted.
    #[must_use]
    pub fn finished(&self) -> Option<&FinishedSession> {
        self.finished.as_ref()
    }

    pub(crate) fn set_finished(&mut self, finished: FinishedSession) {
        self.finished = Some(finished);
    }
}
