use lazy_static::lazy_static;
use tracing::{debug, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    error::{AppError, AppResult},
};

lazy_static! {
    // Verified against when the username is unknown, so that branch costs
    // the same Argon2 work as a wrong password.
    static ref DUMMY_HASH: String = hash_password("authgate-dummy-password").unwrap_or_default();
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Validate, hash and persist a new user.
pub async fn register_user(store: &dyn UserStore, req: RegisterRequest) -> AppResult<User> {
    let (Some(username), Some(password), Some(email)) = (
        required(&req.username),
        required(&req.password),
        required(&req.email),
    ) else {
        return Err(AppError::Validation("All fields are required"));
    };

    let password_hash = hash_password(password)?;
    let user = store
        .create(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
        })
        .await
        .map_err(|e| {
            if matches!(e, AppError::DuplicateUsername) {
                warn!(username, "username already taken");
            }
            e
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Resolve a username/password pair to a user. Both an unknown username and
/// a wrong password yield `InvalidCredentials`.
pub async fn authenticate(store: &dyn UserStore, username: &str, password: &str) -> AppResult<User> {
    let Some(user) = store.find_by_username(username).await? else {
        let _ = verify_password(password, &DUMMY_HASH);
        debug!(username, "login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        debug!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Field presence check for login, then `authenticate`.
pub async fn login_user(store: &dyn UserStore, req: LoginRequest) -> AppResult<User> {
    let (Some(username), Some(password)) = (required(&req.username), required(&req.password))
    else {
        return Err(AppError::Validation("Both username and password are required"));
    };
    info!(username, "attempting login");
    authenticate(store, username, password).await
}
