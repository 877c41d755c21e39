use axum_test::TestServer;
use serde_json::{json, Value};
use vocab_trainer::{api::*, AiProviderKind, AiService, Database, WordService};

async fn create_test_server() -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let word_service = WordService::new(db);
    let ai_service = AiService::new(AiProviderKind::OpenAi, "test_key".to_string(), None, None);
    let app_state = AppState::new(word_service, ai_service, "Vietnamese".to_string());

    let app = create_router(app_state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_session_answer_updates_schedule_once() {
    let server = create_test_server().await;

    let create_response = server
        .post("/api/words")
        .json(&json!({ "text": "resilient", "meaning": "kiên cường" }))
        .await;
    create_response.assert_status_ok();

    let create_body: Value = create_response.json();
    let word_id = create_body["data"]["id"].as_str().unwrap().to_string();
    assert!(create_body["data"]["next_review"].is_null());

    let start_body: Value = server
        .post("/api/review/session/start")
        .json(&json!({}))
        .await
        .json();
    let session_id = start_body["data"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(start_body["data"]["total"], 1);

    // One session answer yields exactly one persisted schedule update.
    let answer_response = server
        .post(&format!("/api/review/session/{}/answer", session_id))
        .json(&json!({ "grade": "learned" }))
        .await;
    answer_response.assert_status_ok();

    let word_body: Value = server.get(&format!("/api/words/{}", word_id)).await.json();
    assert_eq!(word_body["data"]["last_grade"], "learned");
    assert!(word_body["data"]["next_review"].is_string());
    let interval_after_session = word_body["data"]["interval_days"].as_f64().unwrap();
    assert!(interval_after_session > 0.0);

    // Re-reading the word does not move the schedule.
    let word_again: Value = server.get(&format!("/api/words/{}", word_id)).await.json();
    assert_eq!(
        word_again["data"]["interval_days"].as_f64().unwrap(),
        interval_after_session
    );
}

#[tokio::test]
async fn test_direct_review_and_session_review_share_the_curve() {
    let server = create_test_server().await;

    // Two identical words, one graded directly and one through a session.
    let direct: Value = server
        .post("/api/words")
        .json(&json!({ "text": "alpha", "meaning": "a" }))
        .await
        .json();
    let direct_id = direct["data"]["id"].as_str().unwrap().to_string();

    let direct_review: Value = server
        .post(&format!("/api/words/{}/review", direct_id))
        .json(&json!({ "grade": "learned" }))
        .await
        .json();
    let direct_interval = direct_review["data"]["interval_days"].as_f64().unwrap();

    let via_session: Value = server
        .post("/api/words")
        .json(&json!({ "text": "beta", "meaning": "b" }))
        .await
        .json();
    let session_word_id = via_session["data"]["id"].as_str().unwrap().to_string();

    // Only "beta" is still due, so the session holds exactly that word.
    let start_body: Value = server
        .post("/api/review/session/start")
        .json(&json!({}))
        .await
        .json();
    assert_eq!(start_body["data"]["total"], 1);
    let session_id = start_body["data"]["session_id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/review/session/{}/answer", session_id))
        .json(&json!({ "grade": "learned" }))
        .await
        .assert_status_ok();

    let session_word: Value = server
        .get(&format!("/api/words/{}", session_word_id))
        .await
        .json();
    assert_eq!(
        session_word["data"]["interval_days"].as_f64().unwrap(),
        direct_interval
    );
}
