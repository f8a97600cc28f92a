use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{StudentId, WordId};

/// Highest box position; words here are mastered and excluded from sessions.
pub const MAX_BOX: u8 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("box position {0} is outside 0..={MAX_BOX}")]
    BoxOutOfRange(u8),
}

/// A word's position in the Leitner rotation.
///
/// 0 means never passed; `MAX_BOX` means mastered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxPosition(u8);

impl BoxPosition {
    /// Validates a persisted box position.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError::BoxOutOfRange` when above `MAX_BOX`.
    pub fn new(value: u8) -> Result<Self, MasteryError> {
        if value > MAX_BOX {
            return Err(MasteryError::BoxOutOfRange(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn start() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.0 == MAX_BOX
    }
}

/// Durable per-(student, word) mastery state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub student_id: StudentId,
    pub word_id: WordId,
    pub box_position: BoxPosition,
    pub review_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MasteryRecord {
    /// Fresh record for a word just assigned to a student.
    #[must_use]
    pub fn assigned(student_id: StudentId, word_id: WordId, at: DateTime<Utc>) -> Self {
        Self {
            student_id,
            word_id,
            box_position: BoxPosition::start(),
            review_count: 0,
            last_reviewed_at: None,
            created_at: at,
        }
    }

    /// Applies a final-test result to this record.
    ///
    /// Pass: advance one box (capped at `MAX_BOX`) and count the review.
    /// Fail: drop back to box 1 unless the word never left box 0; failed
    /// attempts do not count toward `review_count`.
    pub fn apply_result(&mut self, passed: bool, at: DateTime<Utc>) {
        if passed {
            let next = (self.box_position.0 + 1).min(MAX_BOX);
            self.box_position = BoxPosition(next);
            self.review_count += 1;
        } else if self.box_position.0 > 0 {
            self.box_position = BoxPosition(1);
        }
        self.last_reviewed_at = Some(at);
    }

    /// Whether the word can still be picked for a learning session.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !self.box_position.is_mastered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn record() -> MasteryRecord {
        MasteryRecord::assigned(StudentId::new(1), WordId::new(10), fixed_now())
    }

    #[test]
    fn box_position_rejects_out_of_range() {
        assert!(BoxPosition::new(9).is_err());
        assert_eq!(BoxPosition::new(8).unwrap().value(), 8);
    }

    #[test]
    fn pass_advances_and_counts() {
        let mut rec = record();
        rec.apply_result(true, fixed_now());
        assert_eq!(rec.box_position.value(), 1);
        assert_eq!(rec.review_count, 1);
        assert_eq!(rec.last_reviewed_at, Some(fixed_now()));
    }

    #[test]
    fn pass_caps_at_max_box() {
        let mut rec = record();
        for _ in 0..12 {
            rec.apply_result(true, fixed_now());
        }
        assert_eq!(rec.box_position.value(), MAX_BOX);
        assert_eq!(rec.review_count, 12);
        assert!(!rec.is_eligible());
    }

    #[test]
    fn fail_resets_to_box_one() {
        let mut rec = record();
        for _ in 0..4 {
            rec.apply_result(true, fixed_now());
        }
        rec.apply_result(false, fixed_now());
        assert_eq!(rec.box_position.value(), 1);
        // failures are not reviews
        assert_eq!(rec.review_count, 4);
    }

    #[test]
    fn fail_at_box_zero_stays_at_zero() {
        let mut rec = record();
        rec.apply_result(false, fixed_now());
        assert_eq!(rec.box_position.value(), 0);
        assert_eq!(rec.review_count, 0);
        assert_eq!(rec.last_reviewed_at, Some(fixed_now()));
    }

    #[test]
    fn bounds_hold_across_mixed_results() {
        let mut rec = record();
        let passes = [true, true, false, true, false, false, true, true];
        for passed in passes {
            rec.apply_result(passed, fixed_now());
            assert!(rec.box_position.value() <= MAX_BOX);
        }
    }
}
