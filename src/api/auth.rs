//! Mock authentication: every request is made by the same default user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use uuid::Uuid;

/// Email of the default user.
pub const DEFAULT_USER_EMAIL: &str = "default@example.com";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// User id
    pub id: Uuid,
    /// User email
    pub email: String,
    /// Whether the account is active
    pub is_active: bool,
}

impl Default for CurrentUser {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            email: DEFAULT_USER_EMAIL.to_string(),
            is_active: true,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::default())
    }
}
