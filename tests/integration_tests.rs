use vocab_trainer::{
    challenge::Challenge,
    grading::{grade_challenge, Answer},
    ChallengeKind, CreateWordRequest, Database, ReviewGrade, SrsScheduler, WordService,
};

async fn create_service() -> WordService {
    let db = Database::new("sqlite::memory:").await.unwrap();
    WordService::new(db)
}

fn create_request(text: &str, meaning: Option<&str>) -> CreateWordRequest {
    CreateWordRequest {
        text: text.to_string(),
        meaning: meaning.map(str::to_string),
        unit_id: None,
    }
}

#[tokio::test]
async fn test_word_creation_and_retrieval() {
    let service = create_service().await;

    let created = service
        .add_word(create_request("meticulous", Some("tỉ mỉ")))
        .await
        .unwrap();
    assert_eq!(created.text, "meticulous");
    assert!(created.is_new());
    assert_eq!(created.interval_days, 0.0);

    let retrieved = service.get_word(created.id).await.unwrap();
    assert!(retrieved.is_some());
    assert_eq!(retrieved.unwrap().meaning.as_deref(), Some("tỉ mỉ"));
}

#[tokio::test]
async fn test_srs_scheduling() {
    use chrono::Utc;

    let scheduler = SrsScheduler::new();
    let now = Utc::now();

    let service = create_service().await;
    let mut word = service
        .add_word(create_request("sustain", None))
        .await
        .unwrap();

    // First review stamps a schedule.
    scheduler.update_srs(&mut word, ReviewGrade::Easy, now);
    assert!(word.next_review.unwrap() > now);
    assert_eq!(word.interval_days, 4.0);

    // Easy grows the interval, Forgot shrinks it but never below a day.
    let after_easy = word.interval_days;
    scheduler.update_srs(&mut word, ReviewGrade::Easy, now);
    assert!(word.interval_days > after_easy);

    scheduler.update_srs(&mut word, ReviewGrade::Forgot, now);
    assert!(word.interval_days >= 1.0);
}

#[tokio::test]
async fn test_unit_creation() {
    let service = create_service().await;

    let unit = service
        .save_unit(
            "Unit 3".to_string(),
            Some("Environment vocabulary".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(unit.name, "Unit 3");
    assert_eq!(unit.description, Some("Environment vocabulary".to_string()));

    let units = service.get_all_units().await.unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "Unit 3");
}

#[tokio::test]
async fn test_review_workflow() {
    let service = create_service().await;

    let word = service
        .add_word(create_request("resilient", None))
        .await
        .unwrap();

    // A new word is due immediately.
    let due = service.get_words_due_for_review().await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, word.id);

    let reviewed = service
        .review_word(word.id, ReviewGrade::Easy)
        .await
        .unwrap()
        .unwrap();
    assert!(reviewed.next_review.unwrap() > chrono::Utc::now());
    assert_eq!(reviewed.last_grade, Some(ReviewGrade::Easy));

    // A scheduled word drops out of the due list.
    let due = service.get_words_due_for_review().await.unwrap();
    assert!(due.is_empty());
}

#[tokio::test]
async fn test_challenge_grading_workflow() {
    let service = create_service().await;

    let word = service
        .add_word(create_request("table", Some("cái bàn")))
        .await
        .unwrap();

    let challenges = service
        .challenges_for_word(word.id)
        .await
        .unwrap()
        .unwrap();
    assert!(challenges
        .iter()
        .any(|c| matches!(c, Challenge::Spelling { .. })));

    // Grade a spelling answer with punctuation noise; normalization forgives it.
    let spelling = Challenge::Spelling {
        word: "table".to_string(),
    };
    let result = service
        .grade_and_record(word.id, &spelling, &Answer::Text("T-A-B-L-E".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_correct());

    // The outcome lands in the word's challenge history.
    let stored = service.get_word(word.id).await.unwrap().unwrap();
    assert_eq!(stored.history.lookup(ChallengeKind::Spelling, None), Some(true));

    // A wrong answer flips the stored flag.
    let result = grade_challenge(&spelling, &Answer::Text("tabel".to_string()));
    assert!(!result.is_correct());
}

#[tokio::test]
async fn test_reset_clears_schedule() {
    let service = create_service().await;

    let word = service
        .add_word(create_request("defer", None))
        .await
        .unwrap();
    service
        .review_word(word.id, ReviewGrade::Learned)
        .await
        .unwrap();

    let reset = service.reset_word(word.id).await.unwrap().unwrap();
    assert!(reset.is_new());
    assert!(reset.last_review.is_none());
    assert!(reset.next_review.is_none());
    assert_eq!(reset.interval_days, 0.0);
    assert!(reset.history.is_empty());

    // Back in the due queue after the reset.
    let due = service.get_words_due_for_review().await.unwrap();
    assert_eq!(due.len(), 1);
}
