//! HTTP server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use robocomic_core::ComedyService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::rate_limit::RateLimiter;
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ComedyService>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(service: ComedyService) -> Self {
        Self {
            service: Arc::new(service),
            rate_limiter: RateLimiter::for_shows(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.service.settings().cors_origins);

    Router::new()
        .merge(routes::show_routes(state.rate_limiter.clone()))
        .merge(routes::tts_routes())
        .merge(routes::info_routes())
        .with_state(state)
        .layer(middleware::from_fn(process_time))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until it fails.
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Adds `X-Process-Time` (seconds) to every response.
async fn process_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.6}")) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
