//! # Rate Limit Module
//!
//! Rate limiting a finestra fissa per client sull'endpoint di compressione.
//!
//! ## Responsabilità:
//! - Conta le richieste per indirizzo IP dentro la finestra configurata
//! - Calcola i secondi mancanti alla riapertura della finestra
//! - Rimuove le finestre scadute quando la tabella cresce
//! - Fornisce il middleware `enforce` che risponde 429 oltre il limite
//!
//! ## Note:
//! - Le richieste senza `ConnectInfo` condividono il bucket `0.0.0.0`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use crate::http::errors::ApiError;
use crate::http::AppState;

/// Stale windows are pruned once the table grows past this many clients
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Fixed window limiter keyed by client IP
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record one request from `client`
    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        if self.windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            self.windows
                .retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let mut entry = self.windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        let current = entry.value_mut();

        let elapsed = now.saturating_duration_since(current.started);
        if elapsed >= self.window {
            current.started = now;
            current.count = 0;
        }

        if current.count >= self.max_requests {
            // Whole seconds, rounded up
            let left = self.window.saturating_sub(elapsed);
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            return RateDecision::Limited {
                retry_after: Duration::from_secs(secs),
            };
        }

        current.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - current.count,
        }
    }
}

/// Middleware guarding `/api/compress`
pub async fn enforce(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.limiter.check(client) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(client = %client, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            let limiter = &state.limiter;
            ApiError::too_many_requests(
                format!(
                    "Rate limit exceeded. Maximum {} requests allowed per {} minutes.",
                    limiter.max_requests(),
                    limiter.window().as_secs() / 60
                ),
                retry_after,
            )
            .into_response()
        }
    }
}
