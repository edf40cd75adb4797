use thiserror::Error;

use crate::evaluation::EvaluationError;
use crate::model::{
    ExerciseError, IdError, LessonError, MasteryError, ReviewResultError, WordError,
};
use crate::session::SessionError;
use crate::settings::SettingsError;

/// Any error raised by the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    ReviewResult(#[from] ReviewResultError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
