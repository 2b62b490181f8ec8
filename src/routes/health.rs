//! Health check endpoint

use serde::Serialize;

use super::{ok, RouteResult};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    /// Store backend in use ("mongodb" or "memory")
    pub backend: &'static str,
    pub timestamp: String,
}

pub async fn health_check(state: &AppState) -> RouteResult {
    ok(&HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.pipeline.stores().backend,
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}
