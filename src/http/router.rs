//! # Router Module
//!
//! Costruisce il `Router` axum del servizio.
//!
//! ## Responsabilità:
//! - Registra `/health`, `POST /api/compress` e il fallback 404 JSON
//! - Applica il rate limiting solo alla rotta di compressione
//! - Configura CORS con credenziali ed espone gli header `X-*` del report
//! - Limita la dimensione del body (upload massimo più overhead multipart)
//! - Aggiunge il tracing delle richieste

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_DISPOSITION, header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::CompressError;
use crate::http::handlers::{
    self, HEADER_COMPRESSED_SIZE, HEADER_MESSAGE, HEADER_ORIGINAL_SIZE, HEADER_PRESET,
    HEADER_RATIO, HEADER_SAVED_BYTES, HEADER_TIER,
};
use crate::http::rate_limit;
use crate::http::AppState;

/// Room for multipart boundaries and the small text fields
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(&state.config.cors_origin).map_err(|e| {
        CompressError::Config(format!("Invalid CORS origin {:?}: {}", state.config.cors_origin, e))
    })?;

    let exposed = [
        CONTENT_DISPOSITION,
        HeaderName::from_static(HEADER_RATIO),
        HeaderName::from_static(HEADER_TIER),
        HeaderName::from_static(HEADER_PRESET),
        HeaderName::from_static(HEADER_ORIGINAL_SIZE),
        HeaderName::from_static(HEADER_COMPRESSED_SIZE),
        HeaderName::from_static(HEADER_SAVED_BYTES),
        HeaderName::from_static(HEADER_MESSAGE),
    ];
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .expose_headers(exposed);

    let body_limit = state
        .config
        .max_file_size_bytes()
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let compress = post(handlers::compress).route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::enforce,
    ));

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/api/compress", compress)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
