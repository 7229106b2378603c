//! RoboComic HTTP API.

pub mod error;
pub mod logging;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, app, run};
