//! Request authentication context.
//!
//! Session issuance lives in the auth gateway; by the time a request
//! reaches this service the gateway has stamped the resolved user id
//! onto the `x-user-id` header. The extractor only reads it back.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The acting user, extracted from the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;

        let uuid = Uuid::parse_str(header)
            .map_err(|e| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER} header: {e}")))?;

        Ok(AuthUser(UserId::from_uuid(uuid)))
    }
}
