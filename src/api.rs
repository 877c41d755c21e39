use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    ai_service::{AiService, CancelToken},
    challenge::Challenge,
    errors::{classify_database_error, ApiError, ErrorContext},
    grading::Answer,
    models::*,
    session::{ReviewSession, SessionCard, SessionError, SessionMode, SessionPhase, FINISH_LINGER},
    word_service::WordService,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

/// A stored session plus the cancel handle of its pending retirement task.
pub struct SessionEntry {
    pub session: ReviewSession,
    pub retire: Option<CancelToken>,
}

#[derive(Clone)]
pub struct AppState {
    pub word_service: WordService,
    pub ai_service: AiService,
    pub native_language: String,
    pub review_sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    pub refine_tokens: Arc<Mutex<HashMap<Uuid, CancelToken>>>,
    pub bulk_refine_token: Arc<Mutex<Option<CancelToken>>>,
}

impl AppState {
    pub fn new(word_service: WordService, ai_service: AiService, native_language: String) -> Self {
        Self {
            word_service,
            ai_service,
            native_language,
            review_sessions: Arc::new(Mutex::new(HashMap::new())),
            refine_tokens: Arc::new(Mutex::new(HashMap::new())),
            bulk_refine_token: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub grade: ReviewGrade,
}

#[derive(Deserialize)]
pub struct GradeChallengeRequest {
    pub challenge: Challenge,
    pub answer: Answer,
}

#[derive(Deserialize)]
pub struct ImportDetailsRequest {
    pub details: Vec<WordDetails>,
}

#[derive(Deserialize)]
pub struct ParseDetailsRequest {
    pub raw: String,
}

#[derive(Deserialize)]
pub struct RefineBatchRequest {
    pub word_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub forced_mode: Option<SessionMode>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Deserialize)]
pub struct SessionAnswerRequest {
    pub grade: ReviewGrade,
}

/// Snapshot of a session for the client: the current card plus progress.
#[derive(Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub card: Option<SessionCard>,
    pub total: usize,
    pub completed: usize,
    pub preferences: Preferences,
}

fn session_view(entry: &mut SessionEntry) -> SessionView {
    let card = entry.session.present();
    SessionView {
        session_id: entry.session.id,
        phase: entry.session.phase(),
        total: entry.session.total(),
        completed: entry.session.outcomes().len(),
        preferences: entry.session.preferences.clone(),
        card,
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// Word endpoints

pub async fn create_word(
    State(state): State<AppState>,
    Json(request): Json<CreateWordRequest>,
) -> Result<Json<ApiResponse<Word>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!(text = %request.text, "Creating new word");

    match state.word_service.add_word(request.clone()).await {
        Ok(word) => {
            info!(word_id = %word.id, text = %word.text, "Word created successfully");
            Ok(Json(ApiResponse::success(word)))
        }
        Err(e) => {
            let classified_error = classify_database_error(&e);
            let context = ErrorContext::new("create_word", "word").with_id(&request.text);
            Err(classified_error.to_response_with_context(context))
        }
    }
}

pub async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Word>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("get_word", word_id = id);

    match state.word_service.get_word(id).await {
        Ok(Some(word)) => {
            log_api_success!("get_word", word_id = id, "word retrieved successfully");
            Ok(Json(ApiResponse::success(word)))
        }
        Ok(None) => {
            log_api_warn!("get_word", word_id = id, "word not found");
            let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
            let context = ErrorContext::new("get_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            log_api_error!("get_word", word_id = id, error = e, "database error retrieving word");
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn get_all_words(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<Word>>>, (StatusCode, Json<ApiResponse<()>>)> {
    debug!(limit = ?params.limit, offset = ?params.offset, "Getting words");

    let result = match params.limit {
        Some(limit) => {
            state
                .word_service
                .get_words_paged(limit, params.offset.unwrap_or(0))
                .await
        }
        None => state.word_service.get_all_words().await,
    };

    match result {
        Ok(words) => {
            debug!(word_count = words.len(), "Words retrieved successfully");
            Ok(Json(ApiResponse::success(words)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_all_words", "word");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn search_words(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Word>>>, StatusCode> {
    let search_query = params.q.as_deref().unwrap_or("");

    match state.word_service.search_words(search_query).await {
        Ok(words) => Ok(Json(ApiResponse::success(words))),
        Err(e) => {
            error!(query = ?params.q, error = %e, "Error searching words");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_words_due(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Word>>>, StatusCode> {
    match state.word_service.get_words_due_for_review().await {
        Ok(words) => Ok(Json(ApiResponse::success(words))),
        Err(e) => {
            error!(error = %e, "Error getting due words");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn update_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWordRequest>,
) -> Result<Json<ApiResponse<Word>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!(word_id = %id, "Updating word");

    match state.word_service.update_word(id, request).await {
        Ok(Some(word)) => {
            info!(word_id = %id, text = %word.text, "Word updated successfully");
            Ok(Json(ApiResponse::success(word)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
            let context = ErrorContext::new("update_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let classified_error = classify_database_error(&e);
            let context = ErrorContext::new("update_word", "word").with_id(&id.to_string());
            Err(classified_error.to_response_with_context(context))
        }
    }
}

pub async fn delete_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!(word_id = %id, "Deleting word");

    match state.word_service.delete_word(id).await {
        Ok(deleted) => {
            if deleted {
                info!(word_id = %id, "Word deleted successfully");
                Ok(Json(ApiResponse::success(true)))
            } else {
                let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
                let context = ErrorContext::new("delete_word", "word").with_id(&id.to_string());
                Err(error.to_response_with_context(context))
            }
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("delete_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// Review endpoints

pub async fn review_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ApiResponse<Word>>, StatusCode> {
    match state.word_service.review_word(id, request.grade).await {
        Ok(Some(word)) => Ok(Json(ApiResponse::success(word))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(word_id = %id, grade = ?request.grade, error = %e, "Error reviewing word");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn reset_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Word>>, StatusCode> {
    info!(word_id = %id, "Resetting word progress");

    match state.word_service.reset_word(id).await {
        Ok(Some(word)) => Ok(Json(ApiResponse::success(word))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(word_id = %id, error = %e, "Error resetting word");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Challenge endpoints

pub async fn get_word_challenges(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Challenge>>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("get_word_challenges", word_id = id);

    match state.word_service.challenges_for_word(id).await {
        Ok(Some(challenges)) => {
            log_api_success!(
                "get_word_challenges",
                count = challenges.len(),
                "challenges generated"
            );
            Ok(Json(ApiResponse::success(challenges)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
            let context = ErrorContext::new("get_word_challenges", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            log_api_error!(
                "get_word_challenges",
                word_id = id,
                error = e,
                "challenge generation failed"
            );
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_word_challenges", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn grade_word_challenge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GradeChallengeRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, StatusCode> {
    debug!(word_id = %id, challenge_kind = ?request.challenge.kind(), "Grading challenge answer");

    match state
        .word_service
        .grade_and_record(id, &request.challenge, &request.answer)
        .await
    {
        Ok(Some(result)) => {
            info!(
                word_id = %id,
                challenge_kind = ?request.challenge.kind(),
                is_correct = result.is_correct(),
                "Challenge graded and recorded"
            );
            Ok(Json(ApiResponse::success(json!({ "result": result }))))
        }
        Ok(None) => {
            warn!(word_id = %id, "Word not found for challenge grading");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(word_id = %id, error = %e, "Error grading challenge");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// AI enrichment endpoints

pub async fn refine_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Word>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("refine_word", word_id = id);

    let word = match state.word_service.get_word(id).await {
        Ok(Some(word)) => word,
        Ok(None) => {
            let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
            let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
            return Err(error.to_response_with_context(context));
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
            return Err(error.to_response_with_context(context));
        }
    };

    // A fresh token replaces (and orphans) any earlier in-flight request.
    let token = CancelToken::new();
    {
        let mut tokens = state.refine_tokens.lock().unwrap();
        if let Some(previous) = tokens.insert(id, token.clone()) {
            previous.cancel();
        }
    }

    let generated = state
        .ai_service
        .generate_word_details(&word.text, &state.native_language, &token)
        .await;

    {
        let mut tokens = state.refine_tokens.lock().unwrap();
        tokens.remove(&id);
    }

    match generated {
        Ok(Some(details)) => match state.word_service.apply_details(id, details).await {
            Ok(Some(word)) => {
                log_api_success!("refine_word", word_id = id, "word refined with AI details");
                Ok(Json(ApiResponse::success(word)))
            }
            Ok(None) => {
                let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
                let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
                Err(error.to_response_with_context(context))
            }
            Err(e) => {
                let error = ApiError::DatabaseError(e);
                let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
                Err(error.to_response_with_context(context))
            }
        },
        Ok(None) => {
            log_api_warn!("refine_word", word_id = id, "refinement cancelled by user");
            let error = ApiError::BadRequest("Refinement was cancelled".to_string());
            let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            log_api_error!("refine_word", word_id = id, error = e, "AI generation failed");
            let error = ApiError::AiError(e.to_string());
            let context = ErrorContext::new("refine_word", "word").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn cancel_refine_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    let cancelled = {
        let tokens = state.refine_tokens.lock().unwrap();
        match tokens.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    };
    info!(word_id = %id, cancelled = cancelled, "Refine cancellation requested");
    Ok(Json(ApiResponse::success(cancelled)))
}

/// Refine several words in one AI round trip. A single shared token covers the
/// whole batch; only one bulk refinement can be in flight at a time.
pub async fn refine_words(
    State(state): State<AppState>,
    Json(request): Json<RefineBatchRequest>,
) -> Result<Json<ApiResponse<Vec<Word>>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("refine_words");
    info!(count = request.word_ids.len(), "Starting bulk word refinement");

    let mut texts = Vec::with_capacity(request.word_ids.len());
    for id in &request.word_ids {
        match state.word_service.get_word(*id).await {
            Ok(Some(word)) => texts.push(word.text),
            Ok(None) => {
                let error = ApiError::NotFound(format!("Word with ID '{}' not found", id));
                let context = ErrorContext::new("refine_words", "word").with_id(&id.to_string());
                return Err(error.to_response_with_context(context));
            }
            Err(e) => {
                let error = ApiError::DatabaseError(e);
                let context = ErrorContext::new("refine_words", "word").with_id(&id.to_string());
                return Err(error.to_response_with_context(context));
            }
        }
    }

    let token = CancelToken::new();
    {
        let mut slot = state.bulk_refine_token.lock().unwrap();
        if let Some(previous) = slot.replace(token.clone()) {
            previous.cancel();
        }
    }

    let generated = state
        .ai_service
        .generate_word_details_batch(&texts, &state.native_language, &token)
        .await;

    {
        let mut slot = state.bulk_refine_token.lock().unwrap();
        *slot = None;
    }

    match generated {
        Ok(Some(details)) => match state.word_service.import_details(details).await {
            Ok(words) => {
                log_api_success!("refine_words", count = words.len(), "words refined with AI details");
                Ok(Json(ApiResponse::success(words)))
            }
            Err(e) => {
                let error = ApiError::DatabaseError(e);
                let context = ErrorContext::new("refine_words", "word");
                Err(error.to_response_with_context(context))
            }
        },
        Ok(None) => {
            log_api_warn!("refine_words", "bulk refinement cancelled by user");
            let error = ApiError::BadRequest("Refinement was cancelled".to_string());
            let context = ErrorContext::new("refine_words", "word");
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            log_api_error!("refine_words", error = e, "bulk AI generation failed");
            let error = ApiError::AiError(e.to_string());
            let context = ErrorContext::new("refine_words", "word");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn cancel_refine_words(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    let cancelled = {
        let slot = state.bulk_refine_token.lock().unwrap();
        match slot.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    };
    info!(cancelled = cancelled, "Bulk refine cancellation requested");
    Ok(Json(ApiResponse::success(cancelled)))
}

pub async fn import_word_details(
    State(state): State<AppState>,
    Json(request): Json<ImportDetailsRequest>,
) -> Result<Json<ApiResponse<Vec<Word>>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!(count = request.details.len(), "Importing word details batch");

    match state.word_service.import_details(request.details).await {
        Ok(words) => {
            log_api_success!("import_word_details", count = words.len(), "details imported");
            Ok(Json(ApiResponse::success(words)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("import_word_details", "word");
            Err(error.to_response_with_context(context))
        }
    }
}

/// Manual-paste path: parse raw model output into word details without
/// touching storage. Parse failures surface as a validation error.
pub async fn parse_word_details(
    State(state): State<AppState>,
    Json(request): Json<ParseDetailsRequest>,
) -> Result<Json<ApiResponse<WordDetails>>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.ai_service.parse_word_details_json(&request.raw) {
        Ok(details) => Ok(Json(ApiResponse::success(details))),
        Err(e) => {
            warn!(error = %e, "Failed to parse pasted word details");
            let error = ApiError::ValidationError(format!("Invalid word details JSON: {}", e));
            let context = ErrorContext::new("parse_word_details", "word");
            Err(error.to_response_with_context(context))
        }
    }
}

// Unit endpoints

pub async fn create_unit(
    State(state): State<AppState>,
    Json(request): Json<CreateUnitRequest>,
) -> Result<Json<ApiResponse<Unit>>, StatusCode> {
    match state
        .word_service
        .save_unit(request.name, request.description)
        .await
    {
        Ok(unit) => Ok(Json(ApiResponse::success(unit))),
        Err(e) => {
            error!(error = %e, "Error creating unit");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_units(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Unit>>>, StatusCode> {
    match state.word_service.get_all_units().await {
        Ok(units) => Ok(Json(ApiResponse::success(units))),
        Err(e) => {
            error!(error = %e, "Error getting units");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn delete_unit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    match state.word_service.delete_unit(id).await {
        Ok(deleted) => Ok(Json(ApiResponse::success(deleted))),
        Err(e) => {
            error!(unit_id = %id, error = %e, "Error deleting unit");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Review session endpoints

pub async fn start_review_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<ApiResponse<SessionView>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!(forced_mode = ?request.forced_mode, "Starting new review session");

    let due_words = match state.word_service.get_words_due_for_review().await {
        Ok(words) => {
            debug!(word_count = words.len(), "Retrieved words due for review");
            words
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("start_review_session", "session");
            return Err(error.to_response_with_context(context));
        }
    };

    let session = ReviewSession::new(
        due_words,
        request.forced_mode,
        request.preferences.unwrap_or_default(),
    );
    let session_id = session.id;
    let word_count = session.total();

    let view = {
        let mut sessions = state.review_sessions.lock().unwrap();
        let entry = sessions.entry(session_id).or_insert(SessionEntry {
            session,
            retire: None,
        });
        session_view(entry)
    };

    info!(
        session_id = %session_id,
        word_count = word_count,
        "Review session started successfully"
    );

    Ok(Json(ApiResponse::success(view)))
}

pub async fn get_review_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SessionView>>, StatusCode> {
    let mut sessions = state.review_sessions.lock().unwrap();
    match sessions.get_mut(&session_id) {
        Some(entry) => Ok(Json(ApiResponse::success(session_view(entry)))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Grade the current word, persist its new schedule, and advance. A grade
/// that finishes the session schedules a delayed retirement so the client
/// can still read the summary.
pub async fn submit_session_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SessionAnswerRequest>,
) -> Result<Json<ApiResponse<SessionView>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("submit_session_answer", session_id = session_id);

    let (outcome, finished, view) = {
        let mut sessions = state.review_sessions.lock().unwrap();
        let entry = match sessions.get_mut(&session_id) {
            Some(entry) => entry,
            None => {
                log_api_warn!("submit_session_answer", session_id = session_id, "session not found");
                let error =
                    ApiError::NotFound(format!("Session with ID '{}' not found", session_id));
                let context =
                    ErrorContext::new("submit_session_answer", "session").with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }
        };

        let outcome = match entry.session.record_outcome(request.grade) {
            Ok(outcome) => outcome,
            Err(e @ SessionError::Finished) => {
                let error = ApiError::BadRequest(e.to_string());
                let context = ErrorContext::new("submit_session_answer", "session")
                    .with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }
            Err(e @ SessionError::NewWordGrade) => {
                let error = ApiError::ValidationError(e.to_string());
                let context = ErrorContext::new("submit_session_answer", "session")
                    .with_id(&session_id.to_string());
                return Err(error.to_response_with_context(context));
            }
        };

        let finished = entry.session.phase() == SessionPhase::Finished;
        if finished {
            let token = CancelToken::new();
            entry.retire = Some(token.clone());
            spawn_session_retirement(state.clone(), session_id, token);
        }
        (outcome, finished, session_view(entry))
    };

    // Persist the schedule change outside the session lock.
    if let Err(e) = state
        .word_service
        .review_word(outcome.word_id, outcome.grade)
        .await
    {
        log_api_error!(
            "submit_session_answer",
            session_id = session_id,
            error = e,
            "failed to persist review outcome"
        );
        let error = ApiError::DatabaseError(e);
        let context =
            ErrorContext::new("submit_session_answer", "session").with_id(&session_id.to_string());
        return Err(error.to_response_with_context(context));
    }

    log_api_success!(
        "submit_session_answer",
        session_id = session_id,
        if finished { "session finished" } else { "outcome recorded" }
    );
    Ok(Json(ApiResponse::success(view)))
}

pub async fn delete_review_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, StatusCode> {
    let removed = {
        let mut sessions = state.review_sessions.lock().unwrap();
        match sessions.remove(&session_id) {
            Some(entry) => {
                if let Some(token) = entry.retire {
                    token.cancel();
                }
                true
            }
            None => false,
        }
    };
    info!(session_id = %session_id, removed = removed, "Review session deleted");
    Ok(Json(ApiResponse::success(removed)))
}

/// Remove a finished session after a short linger, unless torn down first.
fn spawn_session_retirement(state: AppState, session_id: Uuid, token: CancelToken) {
    tokio::spawn(async move {
        tokio::time::sleep(FINISH_LINGER).await;
        if token.is_cancelled() {
            debug!(session_id = %session_id, "Session retirement cancelled");
            return;
        }
        let mut sessions = state.review_sessions.lock().unwrap();
        if sessions.remove(&session_id).is_some() {
            info!(session_id = %session_id, "Finished session retired");
        }
    });
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Word routes
        .route("/api/words", post(create_word))
        .route("/api/words", get(get_all_words))
        .route("/api/words/search", get(search_words))
        .route("/api/words/due", get(get_words_due))
        .route("/api/words/import", post(import_word_details))
        .route("/api/words/parse", post(parse_word_details))
        .route("/api/words/refine", post(refine_words))
        .route("/api/words/refine", delete(cancel_refine_words))
        .route("/api/words/:id", get(get_word))
        .route("/api/words/:id", put(update_word))
        .route("/api/words/:id", delete(delete_word))
        .route("/api/words/:id/review", post(review_word))
        .route("/api/words/:id/reset", post(reset_word))
        .route("/api/words/:id/challenges", get(get_word_challenges))
        .route("/api/words/:id/grade", post(grade_word_challenge))
        .route("/api/words/:id/refine", post(refine_word))
        .route("/api/words/:id/refine", delete(cancel_refine_word))
        // Unit routes
        .route("/api/units", post(create_unit))
        .route("/api/units", get(get_units))
        .route("/api/units/:id", delete(delete_unit))
        // Review session routes
        .route("/api/review/session/start", post(start_review_session))
        .route("/api/review/session/:id", get(get_review_session))
        .route("/api/review/session/:id", delete(delete_review_session))
        .route("/api/review/session/:id/answer", post(submit_session_answer))
        .with_state(state)
}

#[cfg(test)]
pub fn create_app(state: AppState) -> Router {
    create_router(state)
}
