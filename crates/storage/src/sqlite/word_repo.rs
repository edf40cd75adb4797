use std::collections::BTreeMap;

use lexi_core::model::{CategoryId, Word, WordCategory, WordId};
use sqlx::Row;

use super::{SqliteRepository, connection, mapping::ser};
use crate::repository::{StorageError, WordRepository};

fn category_id(raw: &str) -> Result<CategoryId, StorageError> {
    CategoryId::new(raw).map_err(ser)
}

#[async_trait::async_trait]
impl WordRepository for SqliteRepository {
    async fn upsert_category(&self, category: &WordCategory) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO categories (id, name, level)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                level = excluded.level
            ",
        )
        .bind(category.id().as_str())
        .bind(category.name())
        .bind(i64::from(category.level()))
        .execute(&self.pool)
        .await
        .map_err(connection)?;
        Ok(())
    }

    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;

        sqlx::query(
            r"
            INSERT INTO words (id, text)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET text = excluded.text
            ",
        )
        .bind(word.id().as_str())
        .bind(word.text())
        .execute(&mut *tx)
        .await
        .map_err(connection)?;

        sqlx::query("DELETE FROM word_categories WHERE word_id = ?1")
            .bind(word.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(connection)?;

        for category in word.categories() {
            sqlx::query("INSERT INTO word_categories (word_id, category_id) VALUES (?1, ?2)")
                .bind(word.id().as_str())
                .bind(category.as_str())
                .execute(&mut *tx)
                .await
                .map_err(connection)?;
        }

        tx.commit().await.map_err(connection)?;
        Ok(())
    }

    async fn get_word(&self, id: &WordId) -> Result<Word, StorageError> {
        let row = sqlx::query("SELECT id, text FROM words WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(connection)?
            .ok_or(StorageError::NotFound)?;
        let text: String = row.try_get("text").map_err(ser)?;

        let rows = sqlx::query(
            "SELECT category_id FROM word_categories WHERE word_id = ?1 ORDER BY category_id",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;
        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            categories.push(category_id(&row.try_get::<String, _>("category_id").map_err(ser)?)?);
        }

        Word::new(id.clone(), text, categories).map_err(ser)
    }

    async fn list_words(&self) -> Result<Vec<Word>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT w.id, w.text, wc.category_id
            FROM words w
            JOIN word_categories wc ON wc.word_id = w.id
            ORDER BY w.id, wc.category_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        let mut grouped: BTreeMap<String, (String, Vec<CategoryId>)> = BTreeMap::new();
        for row in rows {
            let id: String = row.try_get("id").map_err(ser)?;
            let text: String = row.try_get("text").map_err(ser)?;
            let category: String = row.try_get("category_id").map_err(ser)?;
            grouped
                .entry(id)
                .or_insert_with(|| (text, Vec::new()))
                .1
                .push(category_id(&category)?);
        }

        grouped
            .into_iter()
            .map(|(id, (text, categories))| {
                Word::new(WordId::new(id).map_err(ser)?, text, categories).map_err(ser)
            })
            .collect()
    }

    async fn list_categories(&self) -> Result<Vec<WordCategory>, StorageError> {
        let rows = sqlx::query("SELECT id, name, level FROM categories ORDER BY level, id")
            .fetch_all(&self.pool)
            .await
            .map_err(connection)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(ser)?;
            let name: String = row.try_get("name").map_err(ser)?;
            let level: i64 = row.try_get("level").map_err(ser)?;
            let level = u32::try_from(level)
                .map_err(|_| StorageError::Serialization(format!("invalid level: {level}")))?;
            out.push(WordCategory::new(category_id(&id)?, name, level).map_err(ser)?);
        }
        Ok(out)
    }
}
