//! # HTTP Surface Module
//!
//! Strato di trasporto sottile sopra la pipeline di compressione.
//!
//! ## Responsabilità:
//! - `POST /api/compress`: upload multipart, compressione, download in streaming
//! - `GET /health`: stato del servizio
//! - Fallback JSON 404 per qualsiasi altra rotta
//! - Rate limiting per IP, CORS e tracing delle richieste
//!
//! ## Ciclo di vita dei file:
//! - L'upload viene scritto in `upload_dir` con nome unico
//! - Il body della risposta possiede il guard `JobFiles`: a fine stream (o se
//!   il client si disconnette) input e output vengono cancellati subito

use crate::config::Config;
use crate::engine::EngineInvoker;
use crate::pipeline::CompressionPipeline;

/// Error responses.
pub mod errors;
/// Route handlers.
pub mod handlers;
/// Per-client rate limiting.
pub mod rate_limit;
/// Router construction.
pub mod router;
/// Multipart upload intake.
pub mod upload;

pub use errors::ApiError;
pub use rate_limit::RateLimiter;
pub use router::build_router;

/// Shared state behind every handler
pub struct AppState {
    pub config: Config,
    pub pipeline: CompressionPipeline<Box<dyn EngineInvoker>>,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, invoker: Box<dyn EngineInvoker>) -> Self {
        let pipeline = CompressionPipeline::new(&config, invoker);
        let limiter = RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window());
        Self {
            config,
            pipeline,
            limiter,
        }
    }
}
