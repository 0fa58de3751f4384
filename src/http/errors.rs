//! # API Error Module
//!
//! Risposte di errore JSON per la superficie HTTP.
//!
//! ## Responsabilità:
//! - Definisce `ApiError` e il corpo `{ success: false, error, detail?, retryAfter? }`
//! - Mappa gli `Outcome` falliti su 422, 503, 504 o 500
//! - Converte `CompressError`: errori di upload diventano 400, il resto 500
//! - Include il dettaglio diagnostico solo in modalità sviluppo
//! - Aggiunge l'header `Retry-After` alle risposte 429

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::classifier::Outcome;
use crate::error::CompressError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

/// API error rendered as `{ "success": false, "error": ... }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    detail: Option<String>,
    retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, message)
        }
    }

    /// Attach diagnostic detail, only when running in development mode
    pub fn with_diagnostic(mut self, detail: Option<String>, development: bool) -> Self {
        if development {
            self.detail = detail;
        }
        self
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Map a failed job outcome to its status code and message
    pub fn from_outcome(outcome: &Outcome, development: bool) -> Self {
        let status = match outcome {
            Outcome::RecoverableContentError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Outcome::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Outcome::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            Outcome::UnknownFailure { .. } | Outcome::Success { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, outcome.user_message()).with_diagnostic(outcome.detail(), development)
    }
}

impl From<CompressError> for ApiError {
    fn from(err: CompressError) -> Self {
        match err {
            CompressError::Upload(message) => Self::bad_request(message),
            other => {
                tracing::error!("Request failed: {}", other);
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            detail: self.detail,
            retry_after: self.retry_after.map(|d| d.as_secs()),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}
