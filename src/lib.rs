//! Stateless authentication over HTTP: register, log in for a signed JWT,
//! and reach protected routes with `Authorization: Bearer <token>`.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;

pub use app::build_app;
pub use config::AppConfig;
pub use error::{AppError, AppResult, TokenError};
pub use state::AppState;
