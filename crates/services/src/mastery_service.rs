use std::sync::Arc;

use storage::repository::{MasteryRepository, StudentRepository, WordRepository};
use vocab_core::Clock;
use vocab_core::model::{GridStats, MasteryRecord, StudentId, WordId};

use crate::error::MasteryServiceError;

/// Per-(student, word) Leitner box bookkeeping over the mastery store.
///
/// Holds no session state; every call fetches fresh records and persists the
/// transition it computed.
#[derive(Clone)]
pub struct MasteryService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    words: Arc<dyn WordRepository>,
    mastery: Arc<dyn MasteryRepository>,
}

impl MasteryService {
    #[must_use]
    pub fn new(
        clock: Clock,
        students: Arc<dyn StudentRepository>,
        words: Arc<dyn WordRepository>,
        mastery: Arc<dyn MasteryRepository>,
    ) -> Self {
        Self {
            clock,
            students,
            words,
            mastery,
        }
    }

    /// Assign a word to a student at box 0. Re-assigning an already tracked
    /// pair leaves the existing record untouched.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` when the student or word does not exist.
    pub async fn assign_word(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<(), MasteryServiceError> {
        let student = self.students.get_student(student_id).await?;
        self.words.get_words(&[word_id]).await?;

        let record = MasteryRecord::assigned(student.id, word_id, self.clock.now());
        self.mastery.assign_word(&record).await?;
        tracing::info!(
            student_id = student_id.value(),
            word_id = word_id.value(),
            "assigned word"
        );
        Ok(())
    }

    /// Word ids still below the mastered ceiling, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` on storage failures.
    pub async fn eligible_words(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<WordId>, MasteryServiceError> {
        Ok(self.mastery.eligible_words(student_id).await?)
    }

    /// Apply one pass/fail review result to a tracked pair and return the
    /// updated record.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` when the pair was never assigned.
    pub async fn apply_result(
        &self,
        student_id: StudentId,
        word_id: WordId,
        passed: bool,
    ) -> Result<MasteryRecord, MasteryServiceError> {
        let mut record = self.mastery.get_mastery(student_id, word_id).await?;
        record.apply_result(passed, self.clock.now());
        self.mastery.update_mastery(&record).await?;
        tracing::info!(
            student_id = student_id.value(),
            word_id = word_id.value(),
            passed,
            box_position = record.box_position.value(),
            "applied review result"
        );
        Ok(record)
    }

    /// Word counts per box position for one student.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` on storage failures.
    pub async fn grid_stats(
        &self,
        student_id: StudentId,
    ) -> Result<GridStats, MasteryServiceError> {
        let counts = self.mastery.box_counts(student_id).await?;
        Ok(GridStats::from_counts(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{Storage, StorageError};
    use vocab_core::model::{Student, Word};
    use vocab_core::time::{fixed_clock, fixed_now};

    async fn service_with_word() -> MasteryService {
        let storage = Storage::in_memory();
        storage
            .students
            .upsert_student(&Student::new(StudentId::new(1), "Mei", fixed_now()))
            .await
            .unwrap();
        storage
            .words
            .upsert_word(&Word::new(WordId::new(1), "starter", "apple", "苹果", fixed_now()))
            .await
            .unwrap();
        MasteryService::new(
            fixed_clock(),
            storage.students,
            storage.words,
            storage.mastery,
        )
    }

    #[tokio::test]
    async fn assign_then_apply_moves_box() {
        let service = service_with_word().await;
        service
            .assign_word(StudentId::new(1), WordId::new(1))
            .await
            .unwrap();

        let record = service
            .apply_result(StudentId::new(1), WordId::new(1), true)
            .await
            .unwrap();
        assert_eq!(record.box_position.value(), 1);
        assert_eq!(record.review_count, 1);

        let record = service
            .apply_result(StudentId::new(1), WordId::new(1), false)
            .await
            .unwrap();
        assert_eq!(record.box_position.value(), 1);
        assert_eq!(record.review_count, 1);
    }

    #[tokio::test]
    async fn apply_without_assignment_is_not_found() {
        let service = service_with_word().await;
        let err = service
            .apply_result(StudentId::new(1), WordId::new(1), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MasteryServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn assign_rejects_unknown_word() {
        let service = service_with_word().await;
        let err = service
            .assign_word(StudentId::new(1), WordId::new(99))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MasteryServiceError::Storage(StorageError::NotFound)
        ));
    }
}
