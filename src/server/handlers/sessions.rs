use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::Instrument;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub query: String,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_token)?;
    let (session_id, transcript) = state.sessions.create().await;
    let transcript = transcript.lock().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "session_id": session_id,
            "transcript": transcript.entries(),
        })),
    ))
}

pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_token)?;
    let transcript = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    let transcript = transcript.lock().await;
    Ok(Json(json!({
        "session_id": session_id,
        "transcript": transcript.entries(),
    })))
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_token)?;
    let transcript = state.sessions.get_or_create(&session_id).await;

    // Held for the whole answer: one in-flight query per session.
    let mut transcript = transcript.lock().await;
    let answer = state
        .pipeline
        .answer(&payload.query, &mut transcript)
        .instrument(tracing::info_span!("answer", session = %session_id))
        .await?;

    Ok(Json(json!({
        "answer": answer.text,
        "intent": answer.intent,
        "transcript_len": transcript.len(),
    })))
}

pub async fn clear_transcript(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_token)?;
    let transcript = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    let mut transcript = transcript.lock().await;
    state.pipeline.clear(&mut transcript);
    Ok(Json(json!({
        "session_id": session_id,
        "transcript_len": transcript.len(),
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_token)?;
    if !state.sessions.remove(&session_id).await {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
