//! Liveness check that also pings the database.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::config::database;

/// `GET /health` - probes the database with `SELECT 1`.
///
/// Returns 503 with an error document when the probe fails.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    database::ping(&state.db).await?;
    info!(operation = "health_check", "Health check passed");
    Ok(Json(json!({
        "status": "healthy",
        "database": "connected",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
