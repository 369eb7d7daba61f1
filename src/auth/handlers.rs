use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
        extractors::AuthUser,
        services::{login_user, register_user},
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
}

pub fn secure_routes() -> Router<AppState> {
    Router::new().route("/secure/", get(secure))
}

/// POST /register/
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let Json(payload) = payload?;
    register_user(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created successfully",
        }),
    ))
}

/// POST /login/
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(payload) = payload?;
    let user = login_user(state.users.as_ref(), payload).await?;
    let tokens = state.jwt.sign_pair(user.id)?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// GET /secure/
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn secure(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    info!("secure endpoint accessed");
    Json(MessageResponse {
        message: "You have access to this secure endpoint!",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_omits_absent_refresh_token() {
        let response = LoginResponse {
            access_token: "abc".into(),
            refresh_token: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "access_token": "abc" }));
    }
}
