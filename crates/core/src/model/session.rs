use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{SessionId, StudentId, WordId};

/// Words are worked through in fixed batches of this size; the final group
/// may be shorter.
pub const GROUP_SIZE: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a session needs at least one word")]
    EmptyWordList,

    #[error("session is already completed")]
    AlreadyCompleted,

    #[error("expected stage {expected}, session is at {actual}")]
    WrongStage { expected: Stage, actual: Stage },
}

/// Session phase. Stage 1 is exposure, stage 2 the per-group consolidation
/// gate, stage 3 the final test over every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Stage1,
    Stage2,
    Stage3,
}

impl Stage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Stage3 => "stage3",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stage1" => Some(Stage::Stage1),
            "stage2" => Some(Stage::Stage2),
            "stage3" => Some(Stage::Stage3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of interaction produced a stage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageAction {
    Learn,
    Review,
    Test,
}

impl StageAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageAction::Learn => "learn",
            StageAction::Review => "review",
            StageAction::Test => "test",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "learn" => Some(StageAction::Learn),
            "review" => Some(StageAction::Review),
            "test" => Some(StageAction::Test),
            _ => None,
        }
    }
}

/// Outcome stored on a stage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageResult {
    Pending,
    Completed,
    Green,
    Red,
}

impl StageResult {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageResult::Pending => "pending",
            StageResult::Completed => "completed",
            StageResult::Green => "green",
            StageResult::Red => "red",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StageResult::Pending),
            "completed" => Some(StageResult::Completed),
            "green" => Some(StageResult::Green),
            "red" => Some(StageResult::Red),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            StageResult::Green
        } else {
            StageResult::Red
        }
    }
}

/// Append-only audit entry for one stage decision on one word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub session_id: SessionId,
    pub word_id: WordId,
    pub stage: Stage,
    pub action: StageAction,
    pub result: StageResult,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of advancing past a consolidated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAdvance {
    /// Another group remains; the session went back to stage 1.
    NextGroup,
    /// All groups consolidated; the session moved to the final test.
    FinalTest,
}

/// One learning session over an ordered batch of words.
///
/// The selected word list is persisted with the session so groups beyond the
/// first can be materialized when the session reaches them and an interrupted
/// session can be resumed from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: SessionId,
    pub student_id: StudentId,
    pub word_ids: Vec<WordId>,
    pub words_count: u32,
    pub total_groups: u32,
    pub current_group: u32,
    pub current_stage: Stage,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Number of groups needed for `words_count` words.
#[must_use]
pub fn total_groups_for(words_count: usize) -> u32 {
    words_count.div_ceil(GROUP_SIZE) as u32
}

impl LearningSession {
    /// Builds a new session at stage 1, group 1, over the given word order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyWordList` when no words are given.
    pub fn create(
        id: SessionId,
        student_id: StudentId,
        word_ids: Vec<WordId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if word_ids.is_empty() {
            return Err(SessionError::EmptyWordList);
        }
        let words_count = word_ids.len() as u32;
        let total_groups = total_groups_for(word_ids.len());
        Ok(Self {
            id,
            student_id,
            word_ids,
            words_count,
            total_groups,
            current_group: 1,
            current_stage: Stage::Stage1,
            completed: false,
            created_at,
        })
    }

    /// Word ids of a 1-indexed group, in selection order.
    #[must_use]
    pub fn group_word_ids(&self, group: u32) -> &[WordId] {
        let start = ((group.saturating_sub(1)) as usize) * GROUP_SIZE;
        let end = (start + GROUP_SIZE).min(self.word_ids.len());
        if start >= self.word_ids.len() {
            &[]
        } else {
            &self.word_ids[start..end]
        }
    }

    /// Word ids of the group currently being worked.
    #[must_use]
    pub fn current_group_word_ids(&self) -> &[WordId] {
        self.group_word_ids(self.current_group)
    }

    #[must_use]
    pub fn is_last_group(&self) -> bool {
        self.current_group == self.total_groups
    }

    /// Checks the session is live and at `expected`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` or `WrongStage`.
    pub fn ensure_stage(&self, expected: Stage) -> Result<(), SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyCompleted);
        }
        if self.current_stage != expected {
            return Err(SessionError::WrongStage {
                expected,
                actual: self.current_stage,
            });
        }
        Ok(())
    }

    /// Pending stage-1 exposure records for a group.
    #[must_use]
    pub fn stage1_records(&self, group: u32, at: DateTime<Utc>) -> Vec<StageRecord> {
        self.group_word_ids(group)
            .iter()
            .map(|&word_id| StageRecord {
                session_id: self.id,
                word_id,
                stage: Stage::Stage1,
                action: StageAction::Learn,
                result: StageResult::Pending,
                recorded_at: at,
            })
            .collect()
    }

    /// Moves the current group from exposure into consolidation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not live at stage 1.
    pub fn begin_stage2(&mut self) -> Result<(), SessionError> {
        self.ensure_stage(Stage::Stage1)?;
        self.current_stage = Stage::Stage2;
        Ok(())
    }

    /// Advances past a fully green group: either to the next group's stage 1
    /// or, when this was the last group, to the final test.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not live at stage 2.
    pub fn advance_after_stage2(&mut self) -> Result<GroupAdvance, SessionError> {
        self.ensure_stage(Stage::Stage2)?;
        if self.is_last_group() {
            self.current_stage = Stage::Stage3;
            Ok(GroupAdvance::FinalTest)
        } else {
            self.current_group += 1;
            self.current_stage = Stage::Stage1;
            Ok(GroupAdvance::NextGroup)
        }
    }

    /// Marks the session terminally complete.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not live at stage 3.
    pub fn mark_completed(&mut self) -> Result<(), SessionError> {
        self.ensure_stage(Stage::Stage3)?;
        self.completed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn words(n: u64) -> Vec<WordId> {
        (1..=n).map(WordId::new).collect()
    }

    fn session(n: u64) -> LearningSession {
        LearningSession::create(SessionId::new(1), StudentId::new(1), words(n), fixed_now())
            .unwrap()
    }

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(total_groups_for(12), 3);
        assert_eq!(total_groups_for(10), 2);
        assert_eq!(total_groups_for(5), 1);
        assert_eq!(total_groups_for(1), 1);
    }

    #[test]
    fn empty_word_list_is_rejected() {
        let err = LearningSession::create(
            SessionId::new(1),
            StudentId::new(1),
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::EmptyWordList);
    }

    #[test]
    fn last_group_may_be_short() {
        let s = session(7);
        assert_eq!(s.total_groups, 2);
        assert_eq!(s.group_word_ids(1).len(), 5);
        assert_eq!(s.group_word_ids(2).len(), 2);
        assert!(s.group_word_ids(3).is_empty());
    }

    #[test]
    fn stage1_records_are_pending_learn_entries() {
        let s = session(7);
        let records = s.stage1_records(2, fixed_now());
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.stage, Stage::Stage1);
            assert_eq!(record.action, StageAction::Learn);
            assert_eq!(record.result, StageResult::Pending);
        }
    }

    #[test]
    fn walks_groups_then_reaches_final_test() {
        let mut s = session(12);
        s.begin_stage2().unwrap();
        assert_eq!(s.advance_after_stage2().unwrap(), GroupAdvance::NextGroup);
        assert_eq!(s.current_group, 2);
        assert_eq!(s.current_stage, Stage::Stage1);

        s.begin_stage2().unwrap();
        assert_eq!(s.advance_after_stage2().unwrap(), GroupAdvance::NextGroup);
        s.begin_stage2().unwrap();
        assert_eq!(s.advance_after_stage2().unwrap(), GroupAdvance::FinalTest);
        assert_eq!(s.current_stage, Stage::Stage3);
        assert_eq!(s.current_group, 3);
    }

    #[test]
    fn completed_session_blocks_transitions() {
        let mut s = session(3);
        s.begin_stage2().unwrap();
        s.advance_after_stage2().unwrap();
        s.mark_completed().unwrap();

        assert_eq!(s.begin_stage2().unwrap_err(), SessionError::AlreadyCompleted);
        assert_eq!(
            s.mark_completed().unwrap_err(),
            SessionError::AlreadyCompleted
        );
    }

    #[test]
    fn wrong_stage_is_reported() {
        let mut s = session(3);
        let err = s.advance_after_stage2().unwrap_err();
        assert_eq!(
            err,
            SessionError::WrongStage {
                expected: Stage::Stage2,
                actual: Stage::Stage1,
            }
        );
    }

    #[test]
    fn stage_strings_roundtrip() {
        for stage in [Stage::Stage1, Stage::Stage2, Stage::Stage3] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("stage4"), None);
        assert_eq!(StageResult::parse("green"), Some(StageResult::Green));
        assert_eq!(StageAction::parse("test"), Some(StageAction::Test));
    }
}
