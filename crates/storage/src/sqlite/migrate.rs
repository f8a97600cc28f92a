use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations up to the current schema.
///
/// Version 1 creates the base schema: roster (students, words), mastery rows,
/// learning sessions with their ordered word lists and stage records,
/// anti-forget sessions, progress records, and indexes. Version 2 adds the
/// dated review archive.
#[allow(clippy::too_many_lines)]
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

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS students (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS words (
                    id INTEGER PRIMARY KEY,
                    word_set_name TEXT NOT NULL,
                    english TEXT NOT NULL,
                    chinese TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_words (
                    student_id INTEGER NOT NULL,
                    word_id INTEGER NOT NULL,
                    box_position INTEGER NOT NULL CHECK (box_position BETWEEN 0 AND 8),
                    review_count INTEGER NOT NULL CHECK (review_count >= 0),
                    last_reviewed_at TEXT,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (student_id, word_id),
                    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                    FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS learning_sessions (
                    id INTEGER PRIMARY KEY,
                    student_id INTEGER NOT NULL,
                    words_count INTEGER NOT NULL CHECK (words_count > 0),
                    total_groups INTEGER NOT NULL CHECK (total_groups > 0),
                    current_group INTEGER NOT NULL CHECK (current_group >= 1),
                    current_stage TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_words (
                    session_id INTEGER NOT NULL,
                    position INTEGER NOT NULL,
                    word_id INTEGER NOT NULL,
                    PRIMARY KEY (session_id, position),
                    FOREIGN KEY (session_id) REFERENCES learning_sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (word_id) REFERENCES words(id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS stage_records (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    word_id INTEGER NOT NULL,
                    stage TEXT NOT NULL,
                    action TEXT NOT NULL,
                    result TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES learning_sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (word_id) REFERENCES words(id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS anti_forget_sessions (
                    id TEXT PRIMARY KEY,
                    student_id INTEGER NOT NULL,
                    teacher_id TEXT NOT NULL,
                    word_set_name TEXT NOT NULL,
                    words TEXT NOT NULL,
                    review_count INTEGER NOT NULL CHECK (review_count >= 0),
                    total_reviews INTEGER NOT NULL CHECK (total_reviews > 0),
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS learning_progress (
                    id INTEGER PRIMARY KEY,
                    student_id INTEGER NOT NULL,
                    word_set_name TEXT NOT NULL,
                    word_index INTEGER NOT NULL,
                    current_stage INTEGER NOT NULL CHECK (current_stage BETWEEN 0 AND 8),
                    total_groups INTEGER NOT NULL,
                    tasks_completed TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (student_id, word_set_name, word_index),
                    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_student_words_student_box
                    ON student_words (student_id, box_position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_stage_records_session_stage
                    ON stage_records (session_id, stage, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_learning_sessions_student_created
                    ON learning_sessions (student_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_anti_forget_sessions_student
                    ON anti_forget_sessions (student_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

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

    // Version 2: dated per-day review archive.
    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_reviews (
                    id TEXT PRIMARY KEY,
                    student_id INTEGER NOT NULL,
                    word_set_name TEXT NOT NULL,
                    learn_date TEXT NOT NULL,
                    words TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_student_reviews_student_date
                    ON student_reviews (student_id, learn_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(2_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
