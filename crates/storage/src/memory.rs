use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use vocab_core::model::{
    AntiForgetSession, LearningSession, MAX_BOX, MasteryRecord, ProgressRecord, ReviewSessionId,
    ReviewWord, SessionId, Stage, StageRecord, StageResult, Student, StudentId, StudentReview,
    StudentReviewId, Word, WordId,
};

use crate::repository::{
    AntiForgetRepository, MasteryRepository, NewSessionRecord, ProgressRepository,
    SessionRepository, SessionTransition, StorageError, StudentRepository,
    StudentReviewRepository, UpsertOutcome, WordRepository,
};

#[derive(Default)]
struct MemDb {
    students: HashMap<StudentId, Student>,
    words: HashMap<WordId, Word>,
    mastery: HashMap<(StudentId, WordId), MasteryRecord>,
    sessions: HashMap<SessionId, LearningSession>,
    stage_records: Vec<StageRecord>,
    review_sessions: HashMap<ReviewSessionId, AntiForgetSession>,
    student_reviews: HashMap<StudentReviewId, StudentReview>,
    progress: HashMap<(StudentId, String, u32), ProgressRecord>,
    next_session_id: u64,
}

/// In-memory repository for tests and prototyping.
///
/// All state lives behind one mutex so a transition write set is applied
/// under a single lock: validation happens before any mutation, which gives
/// the same all-or-nothing behavior the sqlite backend gets from a
/// transaction.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    db: Arc<Mutex<MemDb>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemDb>, StorageError> {
        self.db
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StudentRepository for InMemoryRepository {
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        db.students.insert(student.id, student.clone());
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Student, StorageError> {
        let db = self.lock()?;
        db.students.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn student_exists(&self, id: StudentId) -> Result<bool, StorageError> {
        let db = self.lock()?;
        Ok(db.students.contains_key(&id))
    }
}

#[async_trait]
impl WordRepository for InMemoryRepository {
    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        db.words.insert(word.id, word.clone());
        Ok(())
    }

    async fn get_words(&self, ids: &[WordId]) -> Result<Vec<Word>, StorageError> {
        let db = self.lock()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match db.words.get(id) {
                Some(word) => out.push(word.clone()),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }

    async fn words_in_set(&self, word_set_name: &str) -> Result<Vec<Word>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<Word> = db
            .words
            .values()
            .filter(|w| w.word_set_name == word_set_name)
            .cloned()
            .collect();
        out.sort_by_key(|w| w.id);
        Ok(out)
    }
}

#[async_trait]
impl MasteryRepository for InMemoryRepository {
    async fn assign_word(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        db.mastery
            .entry((record.student_id, record.word_id))
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get_mastery(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<MasteryRecord, StorageError> {
        let db = self.lock()?;
        db.mastery
            .get(&(student_id, word_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_mastery_many(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        let db = self.lock()?;
        let mut out = Vec::with_capacity(word_ids.len());
        for word_id in word_ids {
            match db.mastery.get(&(student_id, *word_id)) {
                Some(record) => out.push(record.clone()),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }

    async fn update_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        let key = (record.student_id, record.word_id);
        match db.mastery.get_mut(&key) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn eligible_words(&self, student_id: StudentId) -> Result<Vec<WordId>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<WordId> = db
            .mastery
            .values()
            .filter(|r| r.student_id == student_id && r.is_eligible())
            .map(|r| r.word_id)
            .collect();
        out.sort();
        Ok(out)
    }

    async fn box_counts(&self, student_id: StudentId) -> Result<[u64; 9], StorageError> {
        let db = self.lock()?;
        let mut counts = [0_u64; 9];
        for record in db.mastery.values() {
            if record.student_id == student_id {
                let position = record.box_position.value().min(MAX_BOX) as usize;
                counts[position] += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        record: &NewSessionRecord,
    ) -> Result<LearningSession, StorageError> {
        let mut db = self.lock()?;
        db.next_session_id += 1;
        let id = SessionId::new(db.next_session_id);
        let session = LearningSession::create(
            id,
            record.student_id,
            record.word_ids.clone(),
            record.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let stage1 = session.stage1_records(1, record.created_at);
        db.sessions.insert(id, session.clone());
        db.stage_records.extend(stage1);
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<LearningSession, StorageError> {
        let db = self.lock()?;
        db.sessions.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<LearningSession>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<LearningSession> = db
            .sessions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn stage_records(
        &self,
        session_id: SessionId,
        stage: Stage,
    ) -> Result<Vec<StageRecord>, StorageError> {
        let db = self.lock()?;
        Ok(db
            .stage_records
            .iter()
            .filter(|r| r.session_id == session_id && r.stage == stage)
            .cloned()
            .collect())
    }

    async fn apply_transition(&self, transition: &SessionTransition) -> Result<(), StorageError> {
        let mut db = self.lock()?;

        // Validate the whole set before touching anything.
        if let Some(session) = &transition.session {
            if !db.sessions.contains_key(&session.id) {
                return Err(StorageError::NotFound);
            }
        }
        for record in &transition.mastery {
            if !db.mastery.contains_key(&(record.student_id, record.word_id)) {
                return Err(StorageError::NotFound);
            }
        }

        if let Some(session) = &transition.session {
            db.sessions.insert(session.id, session.clone());
            if !transition.complete_stage1.is_empty() {
                for record in db.stage_records.iter_mut() {
                    if record.session_id == session.id
                        && record.stage == Stage::Stage1
                        && transition.complete_stage1.contains(&record.word_id)
                    {
                        record.result = StageResult::Completed;
                    }
                }
            }
        }
        db.stage_records.extend(transition.records.iter().cloned());
        for record in &transition.mastery {
            db.mastery
                .insert((record.student_id, record.word_id), record.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl AntiForgetRepository for InMemoryRepository {
    async fn insert_review_session(
        &self,
        session: &AntiForgetSession,
    ) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        if db.review_sessions.contains_key(&session.id) {
            return Err(StorageError::Conflict);
        }
        db.review_sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_review_session(
        &self,
        id: &ReviewSessionId,
    ) -> Result<AntiForgetSession, StorageError> {
        let db = self.lock()?;
        db.review_sessions
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn review_sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AntiForgetSession>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<AntiForgetSession> = db
            .review_sessions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_review_words(
        &self,
        id: &ReviewSessionId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        let session = db.review_sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        session.words = words.to_vec();
        Ok(())
    }

    async fn set_review_count(
        &self,
        id: &ReviewSessionId,
        review_count: u32,
    ) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        let session = db.review_sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        session.review_count = review_count;
        Ok(())
    }

    async fn delete_review_session(&self, id: &ReviewSessionId) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        db.review_sessions
            .remove(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl StudentReviewRepository for InMemoryRepository {
    async fn insert_student_review(&self, review: &StudentReview) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        if db.student_reviews.contains_key(&review.id) {
            return Err(StorageError::Conflict);
        }
        db.student_reviews.insert(review.id.clone(), review.clone());
        Ok(())
    }

    async fn get_student_review(
        &self,
        id: &StudentReviewId,
    ) -> Result<StudentReview, StorageError> {
        let db = self.lock()?;
        db.student_reviews
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn student_reviews_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentReview>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<StudentReview> = db
            .student_reviews
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.learn_date
                .cmp(&a.learn_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    async fn update_student_review_words(
        &self,
        id: &StudentReviewId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        let review = db.student_reviews.get_mut(id).ok_or(StorageError::NotFound)?;
        review.words = words.to_vec();
        Ok(())
    }

    async fn delete_student_review(&self, id: &StudentReviewId) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        db.student_reviews
            .remove(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<UpsertOutcome, StorageError> {
        let mut db = self.lock()?;
        let key = (
            record.student_id,
            record.word_set_name.clone(),
            record.word_index,
        );
        let outcome = if db.progress.contains_key(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        db.progress.insert(key, record.clone());
        Ok(outcome)
    }

    async fn list_progress(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let db = self.lock()?;
        let mut out: Vec<ProgressRecord> = db
            .progress
            .values()
            .filter(|r| r.student_id == student_id && r.word_set_name == word_set_name)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.word_index);
        Ok(out)
    }

    async fn stage_counts(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<[u64; 9], StorageError> {
        let db = self.lock()?;
        let mut counts = [0_u64; 9];
        for record in db.progress.values() {
            if record.student_id == student_id && record.word_set_name == word_set_name {
                let stage = record.current_stage.min(MAX_BOX) as usize;
                counts[stage] += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_core::time::fixed_now;

    fn assign(repo: &InMemoryRepository, student: u64, word: u64) -> MasteryRecord {
        MasteryRecord::assigned(StudentId::new(student), WordId::new(word), fixed_now())
    }

    #[tokio::test]
    async fn assign_word_is_idempotent() {
        let repo = InMemoryRepository::new();
        let mut record = assign(&repo, 1, 1);
        repo.assign_word(&record).await.unwrap();

        record.apply_result(true, fixed_now());
        repo.update_mastery(&record).await.unwrap();

        // Re-assigning must not reset the advanced record.
        let fresh = assign(&repo, 1, 1);
        repo.assign_word(&fresh).await.unwrap();
        let stored = repo
            .get_mastery(StudentId::new(1), WordId::new(1))
            .await
            .unwrap();
        assert_eq!(stored.box_position.value(), 1);
    }

    #[tokio::test]
    async fn eligible_words_excludes_mastered() {
        let repo = InMemoryRepository::new();
        let mut mastered = assign(&repo, 1, 1);
        for _ in 0..8 {
            mastered.apply_result(true, fixed_now());
        }
        repo.assign_word(&mastered).await.unwrap();
        repo.assign_word(&assign(&repo, 1, 2)).await.unwrap();

        let eligible = repo.eligible_words(StudentId::new(1)).await.unwrap();
        assert_eq!(eligible, vec![WordId::new(2)]);
    }

    #[tokio::test]
    async fn create_session_materializes_first_group_only() {
        let repo = InMemoryRepository::new();
        let record = NewSessionRecord {
            student_id: StudentId::new(1),
            word_ids: (1..=7).map(WordId::new).collect(),
            created_at: fixed_now(),
        };
        let session = repo.create_session(&record).await.unwrap();
        assert_eq!(session.total_groups, 2);

        let stage1 = repo
            .stage_records(session.id, Stage::Stage1)
            .await
            .unwrap();
        assert_eq!(stage1.len(), 5);
        assert!(stage1.iter().all(|r| r.result == StageResult::Pending));
    }

    #[tokio::test]
    async fn transition_with_unknown_mastery_changes_nothing() {
        let repo = InMemoryRepository::new();
        let record = NewSessionRecord {
            student_id: StudentId::new(1),
            word_ids: vec![WordId::new(1)],
            created_at: fixed_now(),
        };
        let mut session = repo.create_session(&record).await.unwrap();
        session.begin_stage2().unwrap();

        // Word 1 was never assigned, so the mastery update must fail and the
        // session row must stay at stage 1.
        let transition = SessionTransition {
            session: Some(session.clone()),
            complete_stage1: vec![WordId::new(1)],
            records: Vec::new(),
            mastery: vec![MasteryRecord::assigned(
                StudentId::new(1),
                WordId::new(1),
                fixed_now(),
            )],
        };
        let err = repo.apply_transition(&transition).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let stored = repo.get_session(session.id).await.unwrap();
        assert_eq!(stored.current_stage, Stage::Stage1);
        let stage1 = repo.stage_records(session.id, Stage::Stage1).await.unwrap();
        assert!(stage1.iter().all(|r| r.result == StageResult::Pending));
    }
}
