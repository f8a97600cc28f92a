use std::sync::Arc;

use storage::repository::{ProgressRepository, StudentRepository, UpsertOutcome};
use vocab_core::Clock;
use vocab_core::model::{GridStats, ProgressRecord, StudentId, TasksCompleted};

use crate::error::ProgressServiceError;

/// One entry of a progress upsert, keyed by (student, word set, word index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpsert {
    pub student_id: StudentId,
    pub word_set_name: String,
    pub word_index: u32,
    pub current_stage: u8,
    pub total_groups: u32,
    pub tasks_completed: TasksCompleted,
}

/// Tally of a batch upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Cross-session resumable progress ledger.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        students: Arc<dyn StudentRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            students,
            progress,
        }
    }

    /// Create or replace one progress record. Last write wins per key;
    /// `tasks_completed` is replaced wholesale, never merged.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` for an unknown student and `Progress` for
    /// a stage outside the grid.
    pub async fn upsert(
        &self,
        entry: ProgressUpsert,
    ) -> Result<UpsertOutcome, ProgressServiceError> {
        if !self.students.student_exists(entry.student_id).await? {
            return Err(storage::repository::StorageError::NotFound.into());
        }
        let record = ProgressRecord::new(
            entry.student_id,
            entry.word_set_name,
            entry.word_index,
            entry.current_stage,
            entry.total_groups,
            entry.tasks_completed,
            self.clock.now(),
        )?;
        let outcome = self.progress.upsert_progress(&record).await?;
        tracing::info!(
            student_id = record.student_id.value(),
            word_set = %record.word_set_name,
            word_index = record.word_index,
            ?outcome,
            "upserted progress"
        );
        Ok(outcome)
    }

    /// Process entries independently: an entry referencing an unknown student
    /// or an invalid stage is skipped, not fatal to the batch.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` only on storage failures.
    pub async fn batch_upsert(
        &self,
        entries: Vec<ProgressUpsert>,
    ) -> Result<BatchOutcome, ProgressServiceError> {
        let mut outcome = BatchOutcome::default();
        for entry in entries {
            if !self.students.student_exists(entry.student_id).await? {
                tracing::warn!(
                    student_id = entry.student_id.value(),
                    word_set = %entry.word_set_name,
                    word_index = entry.word_index,
                    "skipping progress entry for unknown student"
                );
                outcome.skipped += 1;
                continue;
            }
            let record = match ProgressRecord::new(
                entry.student_id,
                entry.word_set_name,
                entry.word_index,
                entry.current_stage,
                entry.total_groups,
                entry.tasks_completed,
                self.clock.now(),
            ) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(
                        student_id = entry.student_id.value(),
                        word_index = entry.word_index,
                        %err,
                        "skipping invalid progress entry"
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };
            match self.progress.upsert_progress(&record).await? {
                UpsertOutcome::Created => outcome.created += 1,
                UpsertOutcome::Updated => outcome.updated += 1,
            }
        }
        Ok(outcome)
    }

    /// Progress records of a student within a word set, by word index.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on storage failures.
    pub async fn list_progress(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<Vec<ProgressRecord>, ProgressServiceError> {
        Ok(self.progress.list_progress(student_id, word_set_name).await?)
    }

    /// Per-stage word counts over the grid, with words that have no record
    /// at all folded into grid 0.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on storage failures.
    pub async fn grid_stats(
        &self,
        student_id: StudentId,
        word_set_name: &str,
        total_word_count: u64,
    ) -> Result<GridStats, ProgressServiceError> {
        let counts = self.progress.stage_counts(student_id, word_set_name).await?;
        Ok(GridStats::from_counts(counts).with_untouched(total_word_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use vocab_core::model::Student;
    use vocab_core::time::{fixed_clock, fixed_now};

    fn entry(student: u64, index: u32, stage: u8) -> ProgressUpsert {
        ProgressUpsert {
            student_id: StudentId::new(student),
            word_set_name: "unit-1".into(),
            word_index: index,
            current_stage: stage,
            total_groups: 2,
            tasks_completed: TasksCompleted::new(),
        }
    }

    async fn service() -> ProgressService {
        let storage = Storage::in_memory();
        storage
            .students
            .upsert_student(&Student::new(StudentId::new(1), "Mei", fixed_now()))
            .await
            .unwrap();
        ProgressService::new(fixed_clock(), storage.students, storage.progress)
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_key() {
        let service = service().await;
        let outcome = service.upsert(entry(1, 0, 2)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let outcome = service.upsert(entry(1, 0, 5)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let records = service.list_progress(StudentId::new(1), "unit-1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].current_stage, 5);
    }

    #[tokio::test]
    async fn batch_skips_unknown_students() {
        let service = service().await;
        let outcome = service
            .batch_upsert(vec![entry(1, 0, 2), entry(99, 1, 2), entry(1, 1, 3)])
            .await
            .unwrap();
        assert_eq!(outcome.created + outcome.updated, 2);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn batch_skips_out_of_grid_stages() {
        let service = service().await;
        let outcome = service
            .batch_upsert(vec![entry(1, 0, 9), entry(1, 1, 8)])
            .await
            .unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn grid_folds_untouched_words_into_zero() {
        let service = service().await;
        let mut entries = Vec::new();
        for index in 0..3 {
            entries.push(entry(1, index, 2));
        }
        for index in 3..5 {
            entries.push(entry(1, index, 5));
        }
        service.batch_upsert(entries).await.unwrap();

        let stats = service
            .grid_stats(StudentId::new(1), "unit-1", 10)
            .await
            .unwrap();
        assert_eq!(stats.grid(0), 5);
        assert_eq!(stats.grid(2), 3);
        assert_eq!(stats.grid(5), 2);
        for position in [1, 3, 4, 6, 7, 8] {
            assert_eq!(stats.grid(position), 0);
        }
    }
}
