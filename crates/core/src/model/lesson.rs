use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::exercise::Exercise;
use crate::model::ids::LessonId;
use crate::settings::SessionSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,
    #[error("lesson lives must be > 0")]
    InvalidLives,
}

/// Ordered bundle of exercises with its own lives and reward overrides.
///
/// `None` overrides fall back to `SessionSettings` when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredLesson")]
pub struct Lesson {
    id: LessonId,
    title: String,
    exercises: Vec<Exercise>,
    lives: Option<u32>,
    xp_reward: Option<u32>,
    gems_reward: Option<u32>,
}

#[derive(Deserialize)]
struct StoredLesson {
    id: LessonId,
    title: String,
    exercises: Vec<Exercise>,
    #[serde(default)]
    lives: Option<u32>,
    #[serde(default)]
    xp_reward: Option<u32>,
    #[serde(default)]
    gems_reward: Option<u32>,
}

impl TryFrom<StoredLesson> for Lesson {
    type Error = LessonError;

    fn try_from(raw: StoredLesson) -> Result<Self, Self::Error> {
        Lesson::from_persisted(
            raw.id,
            raw.title,
            raw.exercises,
            raw.lives,
            raw.xp_reward,
            raw.gems_reward,
        )
    }
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` for a blank title.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        exercises: Vec<Exercise>,
    ) -> Result<Self, LessonError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            exercises,
            lives: None,
            xp_reward: None,
            gems_reward: None,
        })
    }

    /// Rehydrate a lesson from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` for a blank title or a zero lives override.
    pub fn from_persisted(
        id: LessonId,
        title: impl Into<String>,
        exercises: Vec<Exercise>,
        lives: Option<u32>,
        xp_reward: Option<u32>,
        gems_reward: Option<u32>,
    ) -> Result<Self, LessonError> {
        let mut lesson = Self::new(id, title, exercises)?;
        if let Some(lives) = lives {
            lesson = lesson.with_lives(lives)?;
        }
        lesson.xp_reward = xp_reward;
        lesson.gems_reward = gems_reward;
        Ok(lesson)
    }

    /// # Errors
    ///
    /// Returns `LessonError::InvalidLives` when `lives` is zero.
    pub fn with_lives(mut self, lives: u32) -> Result<Self, LessonError> {
        if lives == 0 {
            return Err(LessonError::InvalidLives);
        }
        self.lives = Some(lives);
        Ok(self)
    }

    #[must_use]
    pub fn with_rewards(mut self, xp: u32, gems: u32) -> Self {
        self.xp_reward = Some(xp);
        self.gems_reward = Some(gems);
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    #[must_use]
    pub fn into_exercises(self) -> Vec<Exercise> {
        self.exercises
    }

    #[must_use]
    pub fn lives_override(&self) -> Option<u32> {
        self.lives
    }

    #[must_use]
    pub fn xp_override(&self) -> Option<u32> {
        self.xp_reward
    }

    #[must_use]
    pub fn gems_override(&self) -> Option<u32> {
        self.gems_reward
    }

    /// Session settings with this lesson's overrides applied.
    #[must_use]
    pub fn effective_settings(&self, base: &SessionSettings) -> SessionSettings {
        let mut settings = base.clone();
        if let Some(lives) = self.lives {
            settings = settings.with_lives_unchecked(lives);
        }
        if self.xp_reward.is_some() || self.gems_reward.is_some() {
            settings = settings.with_rewards(
                self.xp_reward.unwrap_or(base.base_xp()),
                self.gems_reward.unwrap_or(base.base_gems()),
            );
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_over_defaults() {
        let lesson = Lesson::new(LessonId::new(1), "Greetings", Vec::new())
            .unwrap()
            .with_lives(2)
            .unwrap()
            .with_rewards(30, 1);
        let settings = lesson.effective_settings(&SessionSettings::default());
        assert_eq!(settings.initial_lives(), 2);
        assert_eq!(settings.base_xp(), 30);
        assert_eq!(settings.base_gems(), 1);
    }

    #[test]
    fn defaults_are_kept_without_overrides() {
        let lesson = Lesson::new(LessonId::new(1), "Greetings", Vec::new()).unwrap();
        let settings = lesson.effective_settings(&SessionSettings::default());
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn zero_lives_rejected() {
        let lesson = Lesson::new(LessonId::new(1), "Greetings", Vec::new()).unwrap();
        assert_eq!(lesson.with_lives(0).unwrap_err(), LessonError::InvalidLives);
    }

    #[test]
    fn stored_lesson_is_revalidated() {
        let err = serde_json::from_str::<Lesson>(
            r#"{"id": 1, "title": "Greetings", "exercises": [], "lives": 0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lives must be > 0"));

        let lesson: Lesson =
            serde_json::from_str(r#"{"id": 1, "title": " Greetings ", "exercises": []}"#).unwrap();
        assert_eq!(lesson.title(), "Greetings");
        assert_eq!(lesson.lives_override(), None);
    }
}
