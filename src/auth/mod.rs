use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
mod password;
pub mod repo;
pub mod repo_types;
pub mod revocation;
pub mod services;

pub use claims::{Claims, Identity, TokenKind};
pub use jwt::{JwtKeys, TokenPair};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::secure_routes())
}
