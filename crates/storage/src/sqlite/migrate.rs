use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            level INTEGER NOT NULL CHECK (level >= 0)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS words (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS word_categories (
            word_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            PRIMARY KEY (word_id, category_id),
            FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            lives INTEGER CHECK (lives IS NULL OR lives > 0),
            xp_reward INTEGER CHECK (xp_reward IS NULL OR xp_reward >= 0),
            gems_reward INTEGER CHECK (gems_reward IS NULL OR gems_reward >= 0),
            exercises TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS word_masteries (
            user_id TEXT NOT NULL,
            word_id TEXT NOT NULL,
            level TEXT NOT NULL,
            accuracy_ewma REAL NOT NULL CHECK (accuracy_ewma BETWEEN 0 AND 1),
            last_reviewed_at TEXT,
            review_count INTEGER NOT NULL CHECK (review_count >= 0),
            below_floor INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, word_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS review_results (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            word_id TEXT NOT NULL,
            accuracy REAL NOT NULL CHECK (accuracy BETWEEN 0 AND 1),
            latency_ms INTEGER NOT NULL CHECK (latency_ms >= 0),
            attempts INTEGER NOT NULL CHECK (attempts >= 0),
            practiced TEXT NOT NULL,
            mistakes TEXT NOT NULL,
            needs_reinforcement INTEGER NOT NULL,
            reviewed_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS review_schedules (
            user_id TEXT PRIMARY KEY,
            generated_at TEXT NOT NULL,
            schedule TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_word_categories_category
            ON word_categories (category_id, word_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_review_results_user_reviewed_at
            ON review_results (user_id, reviewed_at, id);
    ",
];

/// Runs the schema migrations that have not been applied yet.
///
/// Version 1 creates reference data (words, categories, lessons) and the
/// per-user tables (masteries, review results, schedules).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
