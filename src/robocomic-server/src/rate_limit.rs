//! Per-client sliding window rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiError;

/// Show generation: 2 requests per minute per client.
pub const SHOW_REQUESTS_PER_WINDOW: usize = 2;
pub const SHOW_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn for_shows() -> Self {
        Self::new(SHOW_REQUESTS_PER_WINDOW, SHOW_WINDOW)
    }

    /// Record a request from `client` and return its timestamp, or return how
    /// long until the oldest request in the window expires.
    pub async fn check(&self, client: &str) -> Result<Instant, Duration> {
        let mut requests = self.requests.write().await;
        let client_reqs = requests.entry(client.to_string()).or_default();

        let now = Instant::now();
        client_reqs.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if client_reqs.len() >= self.max_requests {
            let oldest = client_reqs.iter().min().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        client_reqs.push(now);
        Ok(now)
    }

    /// Forget a request recorded by [`check`](Self::check).
    pub async fn release(&self, client: &str, recorded_at: Instant) {
        let mut requests = self.requests.write().await;
        if let Some(client_reqs) = requests.get_mut(client) {
            if let Some(pos) = client_reqs.iter().position(|&ts| ts == recorded_at) {
                client_reqs.remove(pos);
            }
        }
    }

    /// Drop clients with no request inside the window.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&ts| now.duration_since(ts) < self.window);
            !timestamps.is_empty()
        });
        debug!(clients = requests.len(), "Rate limiter cleanup");
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.read().await.len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_addr(&request);

    match limiter.check(&client).await {
        Ok(recorded_at) => {
            let response = next.run(request).await;
            // Rejected bodies never reach the model and do not count.
            if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
                limiter.release(&client, recorded_at).await;
            }
            response
        }
        Err(retry_after) => {
            debug!(client = %client, retry_after_secs = retry_after.as_secs(), "Client rate limited");
            ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}

/// Client address from the connection, then `X-Forwarded-For`.
fn client_addr(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
