mod exercise;
mod ids;
mod lesson;
mod mastery;
mod review;
mod session;
mod word;

pub use ids::{CategoryId, ExerciseId, IdError, LessonId, MAX_KEY_LEN, SessionId, UserId, WordId};

pub use exercise::{
    AnswerMode, Exercise, ExerciseDraft, ExerciseError, ExerciseType, SkillCategory,
    UnknownExerciseType,
};
pub use lesson::{Lesson, LessonError};
pub use mastery::{MasteryError, MasteryLevel, UnknownMasteryLevel, WordMastery};
pub use review::{Priority, ReviewResult, ReviewResultError, ReviewType, UnknownTag};
pub use session::{AnswerRecord, SessionProgress, SessionRewards, SessionStatus};
pub use word::{Word, WordCategory, WordError};
