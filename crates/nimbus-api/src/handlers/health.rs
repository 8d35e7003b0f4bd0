//! Health check handler.

use crate::dto::response::HealthResponse;
use crate::ocs::Ocs;

/// GET /health
pub async fn health() -> Ocs<HealthResponse> {
    Ocs::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
