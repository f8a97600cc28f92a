use vocab_core::model::{ReviewWord, StudentId, StudentReview, StudentReviewId};

use crate::repository::{StorageError, StudentReviewRepository};
use super::SqliteRepository;
use super::mapping::{map_student_review_row, student_id_to_i64, words_to_json};

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
impl StudentReviewRepository for SqliteRepository {
    async fn insert_student_review(&self, review: &StudentReview) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO student_reviews (
                id, student_id, word_set_name, learn_date, words, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(review.id.as_str())
        .bind(student_id_to_i64(review.student_id)?)
        .bind(&review.word_set_name)
        .bind(review.learn_date)
        .bind(words_to_json(&review.words)?)
        .bind(review.created_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_student_review(
        &self,
        id: &StudentReviewId,
    ) -> Result<StudentReview, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, student_id, word_set_name, learn_date, words, created_at
            FROM student_reviews
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_student_review_row(&row)
    }

    async fn student_reviews_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentReview>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, student_id, word_set_name, learn_date, words, created_at
            FROM student_reviews
            WHERE student_id = ?1
            ORDER BY learn_date DESC, created_at DESC
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_student_review_row(&row)?);
        }
        Ok(out)
    }

    async fn update_student_review_words(
        &self,
        id: &StudentReviewId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE student_reviews
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

    async fn delete_student_review(&self, id: &StudentReviewId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM student_reviews WHERE id = ?1")
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
