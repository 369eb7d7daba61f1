use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::{AppError, AppResult};

/// Persistence for user records. Username uniqueness is the store's job.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, failing with `DuplicateUsername` if the name is taken.
    async fn create(&self, new: NewUser) -> AppResult<User>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(user),
            // users_username_key; the constraint decides races between concurrent inserts
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

/// Process-local store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        use std::collections::hash_map::Entry;

        let mut users = self.users.write().await;
        match users.entry(new.username) {
            Entry::Occupied(_) => Err(AppError::DuplicateUsername),
            Entry::Vacant(slot) => {
                let user = User {
                    id: Uuid::new_v4(),
                    username: slot.key().clone(),
                    email: new.email,
                    password_hash: new.password_hash,
                    created_at: OffsetDateTime::now_utc(),
                };
                Ok(slot.insert(user).clone())
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$placeholder".into(),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("user1")).await.unwrap();
        let found = store.find_by_username("user1").await.unwrap().expect("user");
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "user1@example.com");
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("user1")).await.unwrap();
        let err = store.create(new_user("user1")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
    }

    #[tokio::test]
    async fn concurrent_creates_yield_exactly_one_winner() {
        let store = Arc::new(MemoryUserStore::new());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_user("racer")).await })
            })
            .collect();

        let mut ok = 0;
        let mut dup = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AppError::DuplicateUsername) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(dup, 7);
    }
}
