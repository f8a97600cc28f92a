use vocab_core::model::{AntiForgetSession, ReviewSessionId, ReviewWord, StudentId};

use crate::repository::{AntiForgetRepository, StorageError};
use super::SqliteRepository;
use super::mapping::{map_review_session_row, student_id_to_i64, words_to_json};

fn conn(e: sqlx::Error) -> StorageError {
    if e.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
    {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

#[async_trait::async_trait]
impl AntiForgetRepository for SqliteRepository {
    async fn insert_review_session(
        &self,
        session: &AntiForgetSession,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO anti_forget_sessions (
                id, student_id, teacher_id, word_set_name, words,
                review_count, total_reviews, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(session.id.as_str())
        .bind(student_id_to_i64(session.student_id)?)
        .bind(session.teacher_id.as_str())
        .bind(&session.word_set_name)
        .bind(words_to_json(&session.words)?)
        .bind(i64::from(session.review_count))
        .bind(i64::from(session.total_reviews))
        .bind(session.created_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_review_session(
        &self,
        id: &ReviewSessionId,
    ) -> Result<AntiForgetSession, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, student_id, teacher_id, word_set_name, words,
                   review_count, total_reviews, created_at
            FROM anti_forget_sessions
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_review_session_row(&row)
    }

    async fn review_sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AntiForgetSession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, student_id, teacher_id, word_set_name, words,
                   review_count, total_reviews, created_at
            FROM anti_forget_sessions
            WHERE student_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_review_session_row(&row)?);
        }
        Ok(out)
    }

    async fn update_review_words(
        &self,
        id: &ReviewSessionId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE anti_forget_sessions
            SET words = ?2
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(words_to_json(words)?)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn set_review_count(
        &self,
        id: &ReviewSessionId,
        review_count: u32,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE anti_forget_sessions
            SET review_count = ?2
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(i64::from(review_count))
        .execute(self.pool())
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_review_session(&self, id: &ReviewSessionId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM anti_forget_sessions WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
