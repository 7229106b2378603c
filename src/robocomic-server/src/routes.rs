//! API routes.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use robocomic_core::{ComicError, DuelResult, JudgeVerdict, LlmConfig, TemperaturePreset, VoiceIds};
use tracing::info;

use crate::error::ApiError;
use crate::models::{GenerateShowRequest, HealthResponse, JudgeShowRequest, PersonasResponse, TtsRequest};
use crate::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::server::AppState;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Show Routes
// ============================================================================

pub fn show_routes(limiter: RateLimiter) -> Router<AppState> {
    let generate = Router::new()
        .route("/generate-show", post(generate_show))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

    Router::new()
        .merge(generate)
        .route("/judge-show", post(judge_show))
}

async fn generate_show(
    State(state): State<AppState>,
    payload: Result<Json<GenerateShowRequest>, JsonRejection>,
) -> Result<Json<DuelResult>, ApiError> {
    let Json(req) = payload?;
    let (request, build_context) = req
        .validate(state.service.personas())
        .map_err(ApiError::Validation)?;

    let result = state.service.generate_show(request, build_context).await;
    info!(messages = result.history.len(), success = result.success, "Show generated");
    Ok(Json(result))
}

async fn judge_show(
    State(state): State<AppState>,
    payload: Result<Json<JudgeShowRequest>, JsonRejection>,
) -> Result<Json<JudgeVerdict>, ApiError> {
    let Json(req) = payload?;
    req.validate().map_err(ApiError::Validation)?;

    let verdict = state
        .service
        .judge_show(&req.comedian1_name, &req.comedian2_name, &req.history, req.lang)
        .await;
    Ok(Json(verdict))
}

// ============================================================================
// TTS Routes
// ============================================================================

pub fn tts_routes() -> Router<AppState> {
    Router::new().route("/tts", post(tts))
}

async fn tts(
    State(state): State<AppState>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let text = req.validate().map_err(ApiError::Validation)?;

    let audio = state
        .service
        .tts(&text, req.lang, req.voice_id.as_deref().map(str::trim))
        .await?;
    let wav = audio
        .into_wav()
        .map_err(|e| ApiError::from(ComicError::TtsError(e.to_string())))?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

// ============================================================================
// Info Routes
// ============================================================================

pub fn info_routes() -> Router<AppState> {
    Router::new()
        .route("/personas", get(personas))
        .route("/health", get(health))
        .route("/llm-config", get(llm_config))
        .route("/temperature-presets", get(temperature_presets))
        .route("/voice-ids", get(voice_ids))
}

async fn personas(State(state): State<AppState>) -> Json<PersonasResponse> {
    Json(PersonasResponse::from_registry(state.service.personas()))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: API_VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn llm_config(State(state): State<AppState>) -> Json<LlmConfig> {
    Json(state.service.llm_config())
}

async fn temperature_presets(State(state): State<AppState>) -> Json<Vec<TemperaturePreset>> {
    Json(state.service.temperature_presets().to_vec())
}

async fn voice_ids(State(state): State<AppState>) -> Json<VoiceIds> {
    Json(state.service.voice_ids().clone())
}
