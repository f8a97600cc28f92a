use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::mastery::MAX_BOX;
use crate::model::StudentId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress stage {0} is outside 0..={MAX_BOX}")]
    StageOutOfRange(u8),
}

/// Completed task numbers per group, e.g. `{1: {1, 2, 3}, 2: {1}}`.
///
/// Kept ordered so serialized progress is stable across writes.
pub type TasksCompleted = BTreeMap<u32, BTreeSet<u32>>;

/// Cross-session resumable progress for one word of a word set.
///
/// `current_stage` shares the 0..=8 domain with box positions but is tracked
/// independently; it is the coarse position a client resumes from, not the
/// mastery tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub student_id: StudentId,
    pub word_set_name: String,
    pub word_index: u32,
    pub current_stage: u8,
    pub total_groups: u32,
    pub tasks_completed: TasksCompleted,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Builds a record, validating the stage domain.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StageOutOfRange` when `current_stage > 8`.
    pub fn new(
        student_id: StudentId,
        word_set_name: impl Into<String>,
        word_index: u32,
        current_stage: u8,
        total_groups: u32,
        tasks_completed: TasksCompleted,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if current_stage > MAX_BOX {
            return Err(ProgressError::StageOutOfRange(current_stage));
        }
        Ok(Self {
            student_id,
            word_set_name: word_set_name.into(),
            word_index,
            current_stage,
            total_groups,
            tasks_completed,
            updated_at,
        })
    }
}

/// Per-stage word counts over the 0..=8 grid.
///
/// Derived on read, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GridStats {
    counts: [u64; 9],
}

impl GridStats {
    #[must_use]
    pub fn from_counts(counts: [u64; 9]) -> Self {
        Self { counts }
    }

    /// Folds never-touched words into grid 0: out of `total_word_count` words
    /// in the set, those without any record count as untouched.
    #[must_use]
    pub fn with_untouched(mut self, total_word_count: u64) -> Self {
        let tracked = self.tracked();
        self.counts[0] += total_word_count.saturating_sub(tracked);
        self
    }

    /// Count of words at the given grid position (0..=8).
    #[must_use]
    pub fn grid(&self, position: u8) -> u64 {
        self.counts.get(position as usize).copied().unwrap_or(0)
    }

    /// Total words with any recorded position.
    #[must_use]
    pub fn tracked(&self) -> u64 {
        self.counts.iter().sum()
    }
}
