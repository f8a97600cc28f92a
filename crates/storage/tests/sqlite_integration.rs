use storage::repository::{
    AntiForgetRepository, MasteryRepository, NewSessionRecord, ProgressRepository,
    SessionRepository, SessionTransition, StorageError, StudentRepository,
    StudentReviewRepository, UpsertOutcome, WordRepository,
};
use storage::sqlite::SqliteRepository;
use vocab_core::model::{
    AntiForgetSession, MasteryRecord, ProgressRecord, ReviewWord, Stage, StageAction, StageRecord,
    StageResult, Student, StudentId, StudentReview, UserId, Word, WordId,
};
use vocab_core::time::fixed_now;

async fn fresh_repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_roster(repo: &SqliteRepository, word_count: u64) -> StudentId {
    let student = Student::new(StudentId::new(1), "Liang", fixed_now());
    repo.upsert_student(&student).await.unwrap();
    for i in 1..=word_count {
        let word = Word::new(WordId::new(i), "starter", format!("word{i}"), "词", fixed_now());
        repo.upsert_word(&word).await.unwrap();
        repo.assign_word(&MasteryRecord::assigned(student.id, word.id, fixed_now()))
            .await
            .unwrap();
    }
    student.id
}

#[tokio::test]
async fn sqlite_roundtrips_roster_and_mastery() {
    let repo = fresh_repo("memdb_roster").await;
    let student_id = seed_roster(&repo, 3).await;

    // Requested order is preserved even when it differs from id order.
    let words = repo
        .get_words(&[WordId::new(3), WordId::new(1)])
        .await
        .unwrap();
    assert_eq!(words[0].id, WordId::new(3));
    assert_eq!(words[1].id, WordId::new(1));

    let missing = repo
        .get_words(&[WordId::new(1), WordId::new(99)])
        .await
        .unwrap_err();
    assert!(matches!(missing, StorageError::NotFound));

    let mut record = repo.get_mastery(student_id, WordId::new(1)).await.unwrap();
    assert_eq!(record.box_position.value(), 0);
    record.apply_result(true, fixed_now());
    repo.update_mastery(&record).await.unwrap();

    let reloaded = repo.get_mastery(student_id, WordId::new(1)).await.unwrap();
    assert_eq!(reloaded.box_position.value(), 1);
    assert_eq!(reloaded.review_count, 1);
    assert_eq!(reloaded.last_reviewed_at, Some(fixed_now()));

    let counts = repo.box_counts(student_id).await.unwrap();
    assert_eq!(counts[0], 2);
    assert_eq!(counts[1], 1);
}

#[tokio::test]
async fn sqlite_assign_word_is_idempotent() {
    let repo = fresh_repo("memdb_assign").await;
    let student_id = seed_roster(&repo, 1).await;

    let mut record = repo.get_mastery(student_id, WordId::new(1)).await.unwrap();
    record.apply_result(true, fixed_now());
    repo.update_mastery(&record).await.unwrap();

    // Re-assigning must not reset existing progress.
    repo.assign_word(&MasteryRecord::assigned(student_id, WordId::new(1), fixed_now()))
        .await
        .unwrap();
    let reloaded = repo.get_mastery(student_id, WordId::new(1)).await.unwrap();
    assert_eq!(reloaded.box_position.value(), 1);
}

#[tokio::test]
async fn sqlite_session_create_materializes_first_group_only() {
    let repo = fresh_repo("memdb_session").await;
    let student_id = seed_roster(&repo, 7).await;

    let session = repo
        .create_session(&NewSessionRecord {
            student_id,
            word_ids: (1..=7).map(WordId::new).collect(),
            created_at: fixed_now(),
        })
        .await
        .unwrap();
    assert_eq!(session.total_groups, 2);
    assert_eq!(session.current_group, 1);

    let stage1 = repo.stage_records(session.id, Stage::Stage1).await.unwrap();
    assert_eq!(stage1.len(), 5);
    assert!(stage1.iter().all(|r| r.result == StageResult::Pending));

    let fetched = repo.get_session(session.id).await.unwrap();
    assert_eq!(fetched.word_ids, session.word_ids);
    assert_eq!(fetched.current_stage, Stage::Stage1);
}

#[tokio::test]
async fn sqlite_apply_transition_is_atomic() {
    let repo = fresh_repo("memdb_transition").await;
    let student_id = seed_roster(&repo, 5).await;

    let mut session = repo
        .create_session(&NewSessionRecord {
            student_id,
            word_ids: (1..=5).map(WordId::new).collect(),
            created_at: fixed_now(),
        })
        .await
        .unwrap();
    session.begin_stage2().unwrap();

    // A record for an unassigned word makes the mastery update fail; nothing
    // from the same transition may stick.
    let bad = MasteryRecord::assigned(student_id, WordId::new(99), fixed_now());
    let err = repo
        .apply_transition(&SessionTransition {
            session: Some(session.clone()),
            complete_stage1: session.word_ids.clone(),
            records: Vec::new(),
            mastery: vec![bad],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let untouched = repo.get_session(session.id).await.unwrap();
    assert_eq!(untouched.current_stage, Stage::Stage1);
    let stage1 = repo.stage_records(session.id, Stage::Stage1).await.unwrap();
    assert!(stage1.iter().all(|r| r.result == StageResult::Pending));

    // The same write set applies cleanly once the bad record is dropped.
    repo.apply_transition(&SessionTransition {
        session: Some(session.clone()),
        complete_stage1: session.word_ids.clone(),
        records: vec![StageRecord {
            session_id: session.id,
            word_id: WordId::new(1),
            stage: Stage::Stage2,
            action: StageAction::Review,
            result: StageResult::Green,
            recorded_at: fixed_now(),
        }],
        mastery: Vec::new(),
    })
    .await
    .unwrap();

    let moved = repo.get_session(session.id).await.unwrap();
    assert_eq!(moved.current_stage, Stage::Stage2);
    let stage1 = repo.stage_records(session.id, Stage::Stage1).await.unwrap();
    assert!(stage1.iter().all(|r| r.result == StageResult::Completed));
    let stage2 = repo.stage_records(session.id, Stage::Stage2).await.unwrap();
    assert_eq!(stage2.len(), 1);
}

#[tokio::test]
async fn sqlite_anti_forget_snapshot_roundtrip() {
    let repo = fresh_repo("memdb_anti_forget").await;
    let student_id = seed_roster(&repo, 2).await;

    let words = vec![
        ReviewWord {
            id: WordId::new(1),
            english: "word1".into(),
            chinese: "词".into(),
            is_starred: false,
        },
        ReviewWord {
            id: WordId::new(2),
            english: "word2".into(),
            chinese: "词".into(),
            is_starred: false,
        },
    ];
    let mut session = AntiForgetSession::create(
        student_id,
        UserId::new("teacher-1"),
        "starter",
        words,
        None,
        fixed_now(),
    )
    .unwrap();
    repo.insert_review_session(&session).await.unwrap();

    let dup = repo.insert_review_session(&session).await.unwrap_err();
    assert!(matches!(dup, StorageError::Conflict));

    assert!(session.toggle_star(WordId::new(2)).unwrap());
    repo.update_review_words(&session.id, &session.words)
        .await
        .unwrap();
    repo.set_review_count(&session.id, 4).await.unwrap();

    let fetched = repo.get_review_session(&session.id).await.unwrap();
    assert_eq!(fetched.review_count, 4);
    assert_eq!(fetched.total_reviews, 10);
    assert!(fetched.words[1].is_starred);

    let listed = repo.review_sessions_for_student(student_id).await.unwrap();
    assert_eq!(listed.len(), 1);

    repo.delete_review_session(&session.id).await.unwrap();
    let gone = repo.get_review_session(&session.id).await.unwrap_err();
    assert!(matches!(gone, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_progress_upsert_distinguishes_created_and_updated() {
    let repo = fresh_repo("memdb_progress").await;
    let student_id = seed_roster(&repo, 1).await;

    let mut record =
        ProgressRecord::new(student_id, "starter", 0, 2, 3, Default::default(), fixed_now())
            .unwrap();
    let outcome = repo.upsert_progress(&record).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    record.current_stage = 5;
    let outcome = repo.upsert_progress(&record).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let listed = repo.list_progress(student_id, "starter").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].current_stage, 5);

    let counts = repo.stage_counts(student_id, "starter").await.unwrap();
    assert_eq!(counts[5], 1);
    assert_eq!(counts.iter().sum::<u64>(), 1);
}

fn date(s: &str) -> chrono::NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn sqlite_student_review_archive_roundtrip() {
    let repo = fresh_repo("memdb_student_reviews").await;
    let student_id = seed_roster(&repo, 2).await;

    let words = vec![
        ReviewWord {
            id: WordId::new(1),
            english: "word1".into(),
            chinese: "词".into(),
            is_starred: false,
        },
        ReviewWord {
            id: WordId::new(2),
            english: "word2".into(),
            chinese: "词".into(),
            is_starred: false,
        },
    ];
    let older = StudentReview::create(
        student_id,
        "starter",
        date("2026-03-01"),
        words.clone(),
        fixed_now(),
    )
    .unwrap();
    let mut newer = StudentReview::create(
        student_id,
        "unit-2",
        date("2026-03-04"),
        words,
        fixed_now(),
    )
    .unwrap();
    repo.insert_student_review(&older).await.unwrap();
    repo.insert_student_review(&newer).await.unwrap();

    let dup = repo.insert_student_review(&older).await.unwrap_err();
    assert!(matches!(dup, StorageError::Conflict));

    assert!(newer.toggle_star(WordId::new(2)).unwrap());
    repo.update_student_review_words(&newer.id, &newer.words)
        .await
        .unwrap();

    let fetched = repo.get_student_review(&newer.id).await.unwrap();
    assert_eq!(fetched.learn_date, date("2026-03-04"));
    assert!(fetched.words[1].is_starred);
    assert_eq!(fetched.starred_count(), 1);

    // Most recent learn date first.
    let listed = repo.student_reviews_for_student(student_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);

    repo.delete_student_review(&older.id).await.unwrap();
    let gone = repo.get_student_review(&older.id).await.unwrap_err();
    assert!(matches!(gone, StorageError::NotFound));
}
