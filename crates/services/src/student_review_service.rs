use std::sync::Arc;

use chrono::NaiveDate;

use storage::repository::{StudentRepository, StudentReviewRepository};
use vocab_core::Clock;
use vocab_core::model::{ReviewWord, StudentId, StudentReview, StudentReviewId, WordId};

use crate::error::StudentReviewServiceError;

/// Dated archive of what a student trained each day.
///
/// Records are written once when the post-training check finishes; afterwards
/// only the per-word star flags change, and removal is an explicit delete.
#[derive(Clone)]
pub struct StudentReviewService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    reviews: Arc<dyn StudentReviewRepository>,
}

impl StudentReviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        students: Arc<dyn StudentRepository>,
        reviews: Arc<dyn StudentReviewRepository>,
    ) -> Self {
        Self {
            clock,
            students,
            reviews,
        }
    }

    /// Archive the words a student trained on `learn_date`.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` for an unknown student, `StudentReview`
    /// for an empty word list, and `Storage(Conflict)` when an identical
    /// record id already exists.
    pub async fn create_review(
        &self,
        student_id: StudentId,
        word_set_name: &str,
        learn_date: NaiveDate,
        words: Vec<ReviewWord>,
    ) -> Result<StudentReview, StudentReviewServiceError> {
        let student = self.students.get_student(student_id).await?;

        let review = StudentReview::create(
            student.id,
            word_set_name,
            learn_date,
            words,
            self.clock.now(),
        )?;
        self.reviews.insert_student_review(&review).await?;
        tracing::info!(
            review_id = review.id.as_str(),
            student_id = student_id.value(),
            %learn_date,
            total_words = review.words.len(),
            "archived student review"
        );
        Ok(review)
    }

    /// Fetch one archived review.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the review does not exist.
    pub async fn review(
        &self,
        id: &StudentReviewId,
    ) -> Result<StudentReview, StudentReviewServiceError> {
        Ok(self.reviews.get_student_review(id).await?)
    }

    /// All archived reviews of a student, most recent learn date first.
    ///
    /// # Errors
    ///
    /// Returns `StudentReviewServiceError::Storage` on storage failures.
    pub async fn reviews_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentReview>, StudentReviewServiceError> {
        Ok(self.reviews.student_reviews_for_student(student_id).await?)
    }

    /// Flip the star on one archived word and persist the whole snapshot.
    /// Returns the new starred state.
    ///
    /// # Errors
    ///
    /// Returns `StudentReview(WordNotInSnapshot)` when the word is not in
    /// the archived list.
    pub async fn toggle_star(
        &self,
        id: &StudentReviewId,
        word_id: WordId,
    ) -> Result<bool, StudentReviewServiceError> {
        let mut review = self.reviews.get_student_review(id).await?;
        let starred = review.toggle_star(word_id)?;
        self.reviews
            .update_student_review_words(id, &review.words)
            .await?;
        Ok(starred)
    }

    /// Remove an archived review.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the review does not exist.
    pub async fn delete_review(
        &self,
        id: &StudentReviewId,
    ) -> Result<(), StudentReviewServiceError> {
        self.reviews.delete_student_review(id).await?;
        tracing::info!(review_id = id.as_str(), "deleted student review");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{Storage, StorageError};
    use vocab_core::model::Student;
    use vocab_core::time::{fixed_clock, fixed_now};

    fn review_word(id: u64, english: &str) -> ReviewWord {
        ReviewWord {
            id: WordId::new(id),
            english: english.into(),
            chinese: "词".into(),
            is_starred: false,
        }
    }

    async fn service() -> StudentReviewService {
        let storage = Storage::in_memory();
        storage
            .students
            .upsert_student(&Student::new(StudentId::new(1), "Mei", fixed_now()))
            .await
            .unwrap();
        StudentReviewService::new(fixed_clock(), storage.students, storage.student_reviews)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn archives_and_lists_newest_learn_date_first() {
        let service = service().await;
        service
            .create_review(
                StudentId::new(1),
                "starter",
                date("2026-03-01"),
                vec![review_word(1, "apple")],
            )
            .await
            .unwrap();
        service
            .create_review(
                StudentId::new(1),
                "unit-2",
                date("2026-03-04"),
                vec![review_word(2, "book")],
            )
            .await
            .unwrap();

        let reviews = service.reviews_for_student(StudentId::new(1)).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].learn_date, date("2026-03-04"));
        assert_eq!(reviews[1].learn_date, date("2026-03-01"));
    }

    #[tokio::test]
    async fn unknown_student_cannot_archive() {
        let service = service().await;
        let err = service
            .create_review(
                StudentId::new(42),
                "starter",
                date("2026-03-01"),
                vec![review_word(1, "apple")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudentReviewServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn star_toggle_persists_through_the_snapshot() {
        let service = service().await;
        let review = service
            .create_review(
                StudentId::new(1),
                "starter",
                date("2026-03-01"),
                vec![review_word(1, "apple"), review_word(2, "book")],
            )
            .await
            .unwrap();

        assert!(service.toggle_star(&review.id, WordId::new(2)).await.unwrap());
        let stored = service.review(&review.id).await.unwrap();
        assert_eq!(stored.starred_count(), 1);
        assert!(stored.words[1].is_starred);

        assert!(!service.toggle_star(&review.id, WordId::new(2)).await.unwrap());
        let stored = service.review(&review.id).await.unwrap();
        assert_eq!(stored.starred_count(), 0);
    }

    #[tokio::test]
    async fn deletion_removes_the_record() {
        let service = service().await;
        let review = service
            .create_review(
                StudentId::new(1),
                "starter",
                date("2026-03-01"),
                vec![review_word(1, "apple")],
            )
            .await
            .unwrap();

        service.delete_review(&review.id).await.unwrap();
        let err = service.review(&review.id).await.unwrap_err();
        assert!(matches!(
            err,
            StudentReviewServiceError::Storage(StorageError::NotFound)
        ));
    }
}
