//! `Json` and `Query` extractors whose rejections render as JSON:API errors.

use super::ApiError;
use crate::errors::Error;
use axum::extract::{
    FromRequest, FromRequestParts,
    multipart::MultipartRejection,
    rejection::{JsonRejection, PathRejection, QueryRejection},
};

/// `axum::Json` with a 400 error document on malformed bodies.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with a 400 error document on bad query strings.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with an error document on bad path segments.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::validation(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        )))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(Error::validation(format!(
            "Invalid path: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(Error::validation(format!(
            "Invalid multipart body: {}",
            rejection.body_text()
        )))
    }
}
