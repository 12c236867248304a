//! HTTP surface the orchestrator invokes.
//!
//! Each pipeline step maps to one route. Handlers stay thin: decode the
//! request, call the step, map the error onto a status code.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::callback::{CallbackRequest, CallbackService};
use crate::ingest::{Artifact, IngestRequest, Ingestor};
use crate::transcribe::{
    TranscribeResultsRequest, TranscribeStartRequest, TranscribeTaskResult, Transcriber,
};
use crate::Error;

#[derive(Clone)]
pub struct AppState {
    pub callbacks: Arc<CallbackService>,
    pub ingestor: Arc<Ingestor>,
    pub transcriber: Arc<Transcriber>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/callback", post(deliver_callback))
        .route("/v1/ingest", post(ingest_source))
        .route("/v1/transcription/start", post(start_transcription))
        .route("/v1/transcription/results", post(transcription_results))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error wrapper mapping delivery failures onto response statuses. Caller
/// mistakes come back as 400, upstream failures as 502, everything else 500.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::UnsupportedDestinationType(_)
            | Error::UnsupportedContentType(_)
            | Error::UnsupportedPayload(_)
            | Error::UnsupportedSourceMode(_)
            | Error::UnsupportedMediaFormat(_)
            | Error::Configuration(_) => StatusCode::BAD_REQUEST,
            Error::RemoteRejection { .. }
            | Error::RedirectLimitExceeded { .. }
            | Error::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("Request failed: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn deliver_callback(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> Result<StatusCode, ApiError> {
    state.callbacks.handle(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ingest_source(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<Artifact>, ApiError> {
    let artifact = state.ingestor.ingest(&request).await?;
    Ok(Json(artifact))
}

async fn start_transcription(
    State(state): State<AppState>,
    Json(request): Json<TranscribeStartRequest>,
) -> Result<StatusCode, ApiError> {
    state.transcriber.start(&request).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transcription_results(
    State(state): State<AppState>,
    Json(request): Json<TranscribeResultsRequest>,
) -> Result<Json<TranscribeTaskResult>, ApiError> {
    let result = state.transcriber.results(&request).await?;
    Ok(Json(result))
}

async fn health() -> &'static str {
    "ok"
}
