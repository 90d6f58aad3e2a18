//! Request extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use tollgate_types::SubscriberId;

use crate::error::ApiError;

/// Authenticated subscriber, taken from the `x-subscriber-id` header.
///
/// The gateway in front of this service authenticates the caller and
/// forwards their identity in this header; a request without it is
/// unauthenticated.
#[derive(Debug, Clone, Copy)]
pub struct Subscriber(pub SubscriberId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Subscriber
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-subscriber-id")
            .ok_or(ApiError::Unauthorized)?;
        let raw = header.to_str().map_err(|_| ApiError::Unauthorized)?;
        let id = SubscriberId::parse(raw).map_err(|_| ApiError::Unauthorized)?;
        Ok(Subscriber(id))
    }
}
