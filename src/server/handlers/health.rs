use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider = state.pipeline.provider();
    Json(json!({
        "status": "ok",
        "index_chunks": state.index.chunk_count(),
        "generation_provider": provider.name(),
        "generation_model": provider.model(),
    }))
}
