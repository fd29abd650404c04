//! Request context extraction.
//!
//! Every business route runs on behalf of a tenant and a user. Both arrive as headers set
//! by the gateway in front of this service; the display name is optional and falls back
//! to the user id.

use service_core::{
    axum::{async_trait, extract::FromRequestParts, http::request::Parts},
    error::AppError,
};
use tracing::Span;

use crate::models::Actor;

pub const COMPANY_ID_HEADER: &str = "x-company-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let company_id = header(parts, COMPANY_ID_HEADER).ok_or_else(|| {
            AppError::AuthError(anyhow::anyhow!("Missing {} header", COMPANY_ID_HEADER))
        })?;
        let user_id = header(parts, USER_ID_HEADER).ok_or_else(|| {
            AppError::AuthError(anyhow::anyhow!("Missing {} header", USER_ID_HEADER))
        })?;
        let name = header(parts, USER_NAME_HEADER).unwrap_or(user_id);

        let span = Span::current();
        span.record("company_id", company_id);
        span.record("user_id", user_id);

        Ok(Actor::new(company_id, user_id, name))
    }
}
