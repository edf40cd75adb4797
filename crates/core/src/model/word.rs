use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, WordId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordError {
    #[error("word text cannot be empty")]
    EmptyText,
    #[error("word must belong to at least one category")]
    NoCategory,
    #[error("category name cannot be empty")]
    EmptyCategoryName,
}

/// Vocabulary item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    id: WordId,
    text: String,
    categories: Vec<CategoryId>,
}

impl Word {
    /// # Errors
    ///
    /// Returns `WordError::EmptyText` for blank text and `WordError::NoCategory`
    /// when no category is given.
    pub fn new(
        id: WordId,
        text: impl Into<String>,
        categories: Vec<CategoryId>,
    ) -> Result<Self, WordError> {
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(WordError::EmptyText);
        }
        let mut categories = categories;
        categories.sort();
        categories.dedup();
        if categories.is_empty() {
            return Err(WordError::NoCategory);
        }
        Ok(Self {
            id,
            text,
            categories,
        })
    }

    #[must_use]
    pub fn id(&self) -> &WordId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn categories(&self) -> &[CategoryId] {
        &self.categories
    }

    #[must_use]
    pub fn in_category(&self, category: &CategoryId) -> bool {
        self.categories.binary_search(category).is_ok()
    }
}

/// Reference data grouping words, e.g. "greetings" or "food".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCategory {
    id: CategoryId,
    name: String,
    level: u32,
}

impl WordCategory {
    /// # Errors
    ///
    /// Returns `WordError::EmptyCategoryName` for a blank name.
    pub fn new(id: CategoryId, name: impl Into<String>, level: u32) -> Result<Self, WordError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(WordError::EmptyCategoryName);
        }
        Ok(Self { id, name, level })
    }

    #[must_use]
    pub fn id(&self) -> &CategoryId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Curriculum level the category is introduced at.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }
}
