//! HTTP API - axum router, handlers and JSON:API documents.
//!
//! Handlers take an [`AppState`] through axum state injection and return
//! [`ApiError`] on failure; its `IntoResponse` implementation is the only place
//! an [`Error`] becomes a status code and an error document.

/// Mock authentication
pub mod auth;
/// JSON:API request and response documents
pub mod document;
/// Extractors with JSON:API error rejections
pub mod extract;
/// Route handlers
pub mod handlers;
/// Request id middleware
pub mod middleware;
/// Router construction
pub mod routes;

use crate::{config::settings::Settings, errors::Error, storage::InvoiceFiles};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use document::{ErrorDocument, ErrorObject};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

pub use routes::build_router;

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Invoice PDF storage
    pub files: InvoiceFiles,
    /// Loaded settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Builds the state; invoice files live under the configured upload directory.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        Self {
            db,
            files: InvoiceFiles::new(settings.storage.upload_dir.clone()),
            settings: Arc::new(settings),
        }
    }
}

/// Wrapper that converts an [`Error`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

/// Maps `ApiError` to a JSON:API error document with the classified status.
/// Every error gets a fresh `error_id` that appears in both the log and the body.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let status_code =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error_id = Uuid::new_v4().to_string();

        if status_code.is_server_error() {
            error!(error = %self.0, error_type = self.0.kind(), status, error_id = %error_id, "server error");
        } else {
            warn!(error = %self.0, error_type = self.0.kind(), status, error_id = %error_id, "client error");
        }

        let body = ErrorDocument {
            errors: vec![ErrorObject {
                status: status.to_string(),
                title: status_code
                    .canonical_reason()
                    .unwrap_or("Error")
                    .to_string(),
                detail: self.0.public_detail(),
                error_id,
            }],
        };
        (status_code, Json(body)).into_response()
    }
}
