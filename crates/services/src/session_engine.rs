use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;

use storage::repository::{
    MasteryRepository, NewSessionRecord, SessionRepository, SessionTransition, WordRepository,
};
use vocab_core::Clock;
use vocab_core::model::{
    GridStats, GroupAdvance, LearningSession, SessionId, Stage, StageAction, StageRecord,
    StageResult, StudentId, WordCard, WordId,
};

use crate::error::SessionEngineError;

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// One caller-supplied pass/fail verdict for a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordResult {
    pub word_id: WordId,
    pub passed: bool,
}

/// Outcome of a stage-2 submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage2Outcome {
    pub all_green: bool,
    /// Where the session moved when the group went all green; `None` means the
    /// group stays in stage 2 and must be retried.
    pub advance: Option<GroupAdvance>,
}

/// Outcome of the final test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage3Outcome {
    pub passed: usize,
    pub failed: usize,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Drives the three-stage learning session state machine.
///
/// Sessions are fetched fresh from the store on every call; the engine keeps
/// no per-session state between calls. Each transition is computed through
/// the core model and handed to the store as one atomic write set.
#[derive(Clone)]
pub struct SessionEngine {
    clock: Clock,
    words: Arc<dyn WordRepository>,
    mastery: Arc<dyn MasteryRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        words: Arc<dyn WordRepository>,
        mastery: Arc<dyn MasteryRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            words,
            mastery,
            sessions,
        }
    }

    /// Start a session over `words_count` eligible words, sampled uniformly
    /// without replacement. Stage-1 records are written for the first group
    /// only; later groups are materialized when the session reaches them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWordCount` for a zero count and `InsufficientWords`
    /// when fewer eligible words exist than requested.
    pub async fn start_session(
        &self,
        student_id: StudentId,
        words_count: u32,
    ) -> Result<LearningSession, SessionEngineError> {
        if words_count == 0 {
            return Err(SessionEngineError::InvalidWordCount);
        }
        let requested = words_count as usize;

        let eligible = self.mastery.eligible_words(student_id).await?;
        if eligible.len() < requested {
            return Err(SessionEngineError::InsufficientWords {
                available: eligible.len(),
                requested,
            });
        }

        let mut rng = rand::rng();
        let word_ids: Vec<WordId> = rand::seq::index::sample(&mut rng, eligible.len(), requested)
            .iter()
            .map(|i| eligible[i])
            .collect();

        let session = self
            .sessions
            .create_session(&NewSessionRecord {
                student_id,
                word_ids,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(
            session_id = session.id.value(),
            student_id = student_id.value(),
            words_count = session.words_count,
            total_groups = session.total_groups,
            "started learning session"
        );
        Ok(session)
    }

    /// Fetch one session.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn session(
        &self,
        session_id: SessionId,
    ) -> Result<LearningSession, SessionEngineError> {
        Ok(self.sessions.get_session(session_id).await?)
    }

    /// Session history for a student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionEngineError::Storage` on storage failures.
    pub async fn sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<LearningSession>, SessionEngineError> {
        Ok(self.sessions.sessions_for_student(student_id).await?)
    }

    /// Cards to show for a stage: the current group for stages 1 and 2, the
    /// shuffled green pool for stage 3.
    ///
    /// # Errors
    ///
    /// Returns `Session(WrongStage)` when the session is not at `stage`.
    pub async fn stage_words(
        &self,
        session_id: SessionId,
        stage: Stage,
    ) -> Result<Vec<WordCard>, SessionEngineError> {
        let session = self.sessions.get_session(session_id).await?;
        session.ensure_stage(stage)?;

        let word_ids = match stage {
            Stage::Stage1 | Stage::Stage2 => session.current_group_word_ids().to_vec(),
            Stage::Stage3 => {
                let mut pool = self.green_pool(&session).await?;
                pool.shuffle(&mut rand::rng());
                pool
            }
        };

        let words = self.words.get_words(&word_ids).await?;
        Ok(words
            .iter()
            .map(|word| WordCard::from_word(word, stage))
            .collect())
    }

    /// Finish the exposure pass for the current group: all of its stage-1
    /// records flip to completed and the session moves to stage 2.
    ///
    /// # Errors
    ///
    /// Returns `Session` errors for a completed session or wrong stage.
    pub async fn complete_stage1(
        &self,
        session_id: SessionId,
    ) -> Result<LearningSession, SessionEngineError> {
        let mut session = self.sessions.get_session(session_id).await?;
        session.begin_stage2()?;

        let transition = SessionTransition {
            session: Some(session.clone()),
            complete_stage1: session.current_group_word_ids().to_vec(),
            ..SessionTransition::default()
        };
        self.sessions.apply_transition(&transition).await?;
        tracing::info!(
            session_id = session_id.value(),
            group = session.current_group,
            "stage 1 completed"
        );
        Ok(session)
    }

    /// Submit consolidation results for the current group. The group advances
    /// only when every word is green; otherwise nothing is persisted and the
    /// caller retries the same group.
    ///
    /// # Errors
    ///
    /// Returns `MissingResult`/`UnknownWord` when the submitted results do
    /// not match the current group, and `Session` errors for wrong stage.
    pub async fn complete_stage2(
        &self,
        session_id: SessionId,
        results: &[WordResult],
    ) -> Result<Stage2Outcome, SessionEngineError> {
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_stage(Stage::Stage2)?;

        let group: Vec<WordId> = session.current_group_word_ids().to_vec();
        let verdicts = collect_verdicts(results, &group)?;

        if verdicts.values().any(|&passed| !passed) {
            tracing::info!(
                session_id = session_id.value(),
                group = session.current_group,
                "stage 2 not all green, group retained"
            );
            return Ok(Stage2Outcome {
                all_green: false,
                advance: None,
            });
        }

        let now = self.clock.now();
        let mut records: Vec<StageRecord> = group
            .iter()
            .map(|&word_id| StageRecord {
                session_id: session.id,
                word_id,
                stage: Stage::Stage2,
                action: StageAction::Review,
                result: StageResult::Green,
                recorded_at: now,
            })
            .collect();

        let advance = session.advance_after_stage2()?;
        if advance == GroupAdvance::NextGroup {
            records.extend(session.stage1_records(session.current_group, now));
        }

        let transition = SessionTransition {
            session: Some(session.clone()),
            records,
            ..SessionTransition::default()
        };
        self.sessions.apply_transition(&transition).await?;
        tracing::info!(
            session_id = session_id.value(),
            group = session.current_group,
            ?advance,
            "stage 2 all green"
        );
        Ok(Stage2Outcome {
            all_green: true,
            advance: Some(advance),
        })
    }

    /// Submit the final test. Every word in the green pool needs a verdict;
    /// mastery updates, stage-3 audit records, and the completion flag commit
    /// as one unit or not at all.
    ///
    /// # Errors
    ///
    /// Returns `MissingResult`/`UnknownWord` for a verdict set that does not
    /// cover the pool, and `Session` errors for wrong stage.
    pub async fn complete_stage3(
        &self,
        session_id: SessionId,
        results: &[WordResult],
    ) -> Result<Stage3Outcome, SessionEngineError> {
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_stage(Stage::Stage3)?;

        let pool = self.green_pool(&session).await?;
        let verdicts = collect_verdicts(results, &pool)?;

        let now = self.clock.now();
        let mut mastery = self
            .mastery
            .get_mastery_many(session.student_id, &pool)
            .await?;
        let mut passed_count = 0_usize;
        let mut records = Vec::with_capacity(pool.len());
        for record in &mut mastery {
            let passed = verdicts[&record.word_id];
            record.apply_result(passed, now);
            if passed {
                passed_count += 1;
            }
            records.push(StageRecord {
                session_id: session.id,
                word_id: record.word_id,
                stage: Stage::Stage3,
                action: StageAction::Test,
                result: StageResult::from_passed(passed),
                recorded_at: now,
            });
        }

        session.mark_completed()?;
        let transition = SessionTransition {
            session: Some(session.clone()),
            complete_stage1: Vec::new(),
            records,
            mastery,
        };
        self.sessions.apply_transition(&transition).await?;

        let outcome = Stage3Outcome {
            passed: passed_count,
            failed: pool.len() - passed_count,
        };
        tracing::info!(
            session_id = session_id.value(),
            passed = outcome.passed,
            failed = outcome.failed,
            "session completed"
        );
        Ok(outcome)
    }

    /// Word counts per mastery box for one student.
    ///
    /// # Errors
    ///
    /// Returns `SessionEngineError::Storage` on storage failures.
    pub async fn grid_stats(
        &self,
        student_id: StudentId,
    ) -> Result<GridStats, SessionEngineError> {
        let counts = self.mastery.box_counts(student_id).await?;
        Ok(GridStats::from_counts(counts))
    }

    /// Every word that went green in stage 2, in first-seen order.
    async fn green_pool(
        &self,
        session: &LearningSession,
    ) -> Result<Vec<WordId>, SessionEngineError> {
        let records = self
            .sessions
            .stage_records(session.id, Stage::Stage2)
            .await?;
        let mut seen = HashSet::new();
        Ok(records
            .into_iter()
            .filter(|r| r.result == StageResult::Green)
            .map(|r| r.word_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }
}

/// Index verdicts by word id and check they cover `expected` exactly.
fn collect_verdicts(
    results: &[WordResult],
    expected: &[WordId],
) -> Result<HashMap<WordId, bool>, SessionEngineError> {
    let expected_set: HashSet<WordId> = expected.iter().copied().collect();
    let mut verdicts = HashMap::with_capacity(results.len());
    for result in results {
        if !expected_set.contains(&result.word_id) {
            return Err(SessionEngineError::UnknownWord(result.word_id));
        }
        verdicts.insert(result.word_id, result.passed);
    }
    for word_id in expected {
        if !verdicts.contains_key(word_id) {
            return Err(SessionEngineError::MissingResult(*word_id));
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_must_cover_the_pool() {
        let pool = [WordId::new(1), WordId::new(2)];
        let err = collect_verdicts(
            &[WordResult {
                word_id: WordId::new(1),
                passed: true,
            }],
            &pool,
        )
        .unwrap_err();
        assert!(matches!(err, SessionEngineError::MissingResult(id) if id == WordId::new(2)));
    }

    #[test]
    fn verdicts_reject_strays() {
        let pool = [WordId::new(1)];
        let err = collect_verdicts(
            &[
                WordResult {
                    word_id: WordId::new(1),
                    passed: true,
                },
                WordResult {
                    word_id: WordId::new(9),
                    passed: false,
                },
            ],
            &pool,
        )
        .unwrap_err();
        assert!(matches!(err, SessionEngineError::UnknownWord(id) if id == WordId::new(9)));
    }
}
