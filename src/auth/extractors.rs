use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::error::AppError;

/// Runs the bearer-token check before the handler body; a handler taking
/// `AuthUser` is only reached with a valid, unexpired, unrevoked access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let identity = keys.verify_bearer(header).await.map_err(|e| {
            warn!(error = %e, uri = %parts.uri, "rejected bearer token");
            e
        })?;
        Ok(AuthUser(identity))
    }
}
