//! API error envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use robocomic_core::ComicError;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use crate::models::FieldError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    #[error("TTS service unavailable: out of credits or invalid API key.")]
    TtsCreditsExceeded,

    #[error("Failed to generate audio")]
    TtsGenerationFailed(String),

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    error_code: &'static str,
    details: Value,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TtsCreditsExceeded => StatusCode::PAYMENT_REQUIRED,
            ApiError::TtsGenerationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::TtsCreditsExceeded => "TTS_CREDITS_EXCEEDED",
            ApiError::TtsGenerationFailed(_) => "TTS_GENERATION_FAILED",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::TtsGenerationFailed(cause) => json!({ "original_error": cause }),
            ApiError::RateLimited { retry_after_secs } => json!({ "retry_after": retry_after_secs }),
            // Internals are logged, never returned.
            ApiError::TtsCreditsExceeded | ApiError::Internal(_) => json!({}),
        }
    }
}

impl From<ComicError> for ApiError {
    fn from(err: ComicError) -> Self {
        match err {
            ComicError::TtsCreditsExceeded => ApiError::TtsCreditsExceeded,
            ComicError::TtsError(message) => ApiError::TtsGenerationFailed(message),
            ComicError::UnknownPersona(key) => ApiError::Validation(vec![FieldError::new(
                "value_error",
                "comedian_style",
                format!("Unknown persona: {key}"),
                key,
            )]),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError {
            kind: "json_invalid",
            loc: vec!["body".to_string()],
            msg: rejection.body_text(),
            input: Value::Null,
        }])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(cause) => error!(error = %cause, "Unexpected error"),
            ApiError::TtsGenerationFailed(cause) => error!(error = %cause, "TTS generation failed"),
            ApiError::TtsCreditsExceeded => error!("TTS service unavailable: out of credits or invalid API key"),
            ApiError::Validation(errors) => warn!(errors = errors.len(), "Validation error"),
            ApiError::RateLimited { .. } => warn!("Rate limit exceeded"),
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            error_code: self.error_code(),
            details: self.details(),
        };
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
