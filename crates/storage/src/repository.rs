use async_trait::async_trait;
use lexi_core::model::{
    CategoryId, Lesson, LessonId, ReviewResult, UserId, Word, WordCategory, WordId, WordMastery,
};
use lexi_core::scheduler::ReviewSchedule;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Vocabulary and category reference data.
#[async_trait]
pub trait WordRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the category cannot be stored.
    async fn upsert_category(&self, category: &WordCategory) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the word cannot be stored.
    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_word(&self, id: &WordId) -> Result<Word, StorageError>;

    /// All words, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_words(&self) -> Result<Vec<Word>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_categories(&self) -> Result<Vec<WordCategory>, StorageError>;
}

/// Lesson content provider. Lessons are opaque, immutable input to sessions.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError>;
}

/// Per-user word mastery records.
#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// All records of `user`, ordered by word id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn load_word_masteries(&self, user: &UserId) -> Result<Vec<WordMastery>, StorageError>;

    /// Insert or replace the given records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any record cannot be stored.
    async fn save_word_masteries(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
    ) -> Result<(), StorageError>;
}

/// Append-only review result history.
#[async_trait]
pub trait ReviewHistoryRepository: Send + Sync {
    /// All results of `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn load_review_history(&self, user: &UserId) -> Result<Vec<ReviewResult>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the results cannot be stored.
    async fn append_review_results(
        &self,
        user: &UserId,
        results: &[ReviewResult],
    ) -> Result<(), StorageError>;
}

/// Last computed schedule per user.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the schedule cannot be stored.
    async fn save_schedule(
        &self,
        user: &UserId,
        schedule: &ReviewSchedule,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn load_schedule(&self, user: &UserId) -> Result<Option<ReviewSchedule>, StorageError>;
}

/// Atomic write of a mastery update and the results that caused it.
#[async_trait]
pub trait MasteryPersistence: Send + Sync {
    /// Store `masteries` and append `results` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any part fails; nothing is written in that case.
    async fn commit_review(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
        results: &[ReviewResult],
    ) -> Result<(), StorageError>;
}

type PerUser<T> = Arc<Mutex<HashMap<UserId, T>>>;

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    words: Arc<Mutex<BTreeMap<WordId, Word>>>,
    categories: Arc<Mutex<BTreeMap<CategoryId, WordCategory>>>,
    lessons: Arc<Mutex<BTreeMap<LessonId, Lesson>>>,
    masteries: PerUser<BTreeMap<WordId, WordMastery>>,
    history: PerUser<Vec<ReviewResult>>,
    schedules: PerUser<ReviewSchedule>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WordRepository for InMemoryRepository {
    async fn upsert_category(&self, category: &WordCategory) -> Result<(), StorageError> {
        lock(&self.categories)?.insert(category.id().clone(), category.clone());
        Ok(())
    }

    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError> {
        lock(&self.words)?.insert(word.id().clone(), word.clone());
        Ok(())
    }

    async fn get_word(&self, id: &WordId) -> Result<Word, StorageError> {
        lock(&self.words)?
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_words(&self) -> Result<Vec<Word>, StorageError> {
        Ok(lock(&self.words)?.values().cloned().collect())
    }

    async fn list_categories(&self) -> Result<Vec<WordCategory>, StorageError> {
        Ok(lock(&self.categories)?.values().cloned().collect())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        lock(&self.lessons)?.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError> {
        lock(&self.lessons)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
        Ok(lock(&self.lessons)?.values().cloned().collect())
    }
}

#[async_trait]
impl MasteryRepository for InMemoryRepository {
    async fn load_word_masteries(&self, user: &UserId) -> Result<Vec<WordMastery>, StorageError> {
        Ok(lock(&self.masteries)?
            .get(user)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_word_masteries(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.masteries)?;
        let slot = guard.entry(user.clone()).or_default();
        for mastery in masteries {
            slot.insert(mastery.word_id().clone(), mastery.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewHistoryRepository for InMemoryRepository {
    async fn load_review_history(&self, user: &UserId) -> Result<Vec<ReviewResult>, StorageError> {
        Ok(lock(&self.history)?.get(user).cloned().unwrap_or_default())
    }

    async fn append_review_results(
        &self,
        user: &UserId,
        results: &[ReviewResult],
    ) -> Result<(), StorageError> {
        lock(&self.history)?
            .entry(user.clone())
            .or_default()
            .extend_from_slice(results);
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    async fn save_schedule(
        &self,
        user: &UserId,
        schedule: &ReviewSchedule,
    ) -> Result<(), StorageError> {
        lock(&self.schedules)?.insert(user.clone(), schedule.clone());
        Ok(())
    }

    async fn load_schedule(&self, user: &UserId) -> Result<Option<ReviewSchedule>, StorageError> {
        Ok(lock(&self.schedules)?.get(user).cloned())
    }
}

#[async_trait]
impl MasteryPersistence for InMemoryRepository {
    async fn commit_review(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
        results: &[ReviewResult],
    ) -> Result<(), StorageError> {
        // Both guards are held so readers never see one half without the other.
        let mut mastery_guard = lock(&self.masteries)?;
        let mut history_guard = lock(&self.history)?;
        let slot = mastery_guard.entry(user.clone()).or_default();
        for mastery in masteries {
            slot.insert(mastery.word_id().clone(), mastery.clone());
        }
        history_guard
            .entry(user.clone())
            .or_default()
            .extend_from_slice(results);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub words: Arc<dyn WordRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub masteries: Arc<dyn MasteryRepository>,
    pub history: Arc<dyn ReviewHistoryRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub persistence: Arc<dyn MasteryPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every role.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: WordRepository
            + LessonRepository
            + MasteryRepository
            + ReviewHistoryRepository
            + ScheduleRepository
            + MasteryPersistence
            + Clone
            + 'static,
    {
        Self {
            words: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            masteries: Arc::new(repo.clone()),
            history: Arc::new(repo.clone()),
            schedules: Arc::new(repo.clone()),
            persistence: Arc::new(repo),
        }
    }
}
