//! Revoked token identifiers (`jti`), consulted by the verifier.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;

#[async_trait]
pub trait RevocationSet: Send + Sync {
    /// Idempotent. Returns `true` only for the call that recorded the id,
    /// so racing callers can tell who got there first.
    async fn revoke(&self, token_id: Uuid) -> AppResult<bool>;
    async fn is_revoked(&self, token_id: Uuid) -> AppResult<bool>;
}

/// Used when revocation is disabled: nothing is ever revoked.
pub struct NoopRevocationSet;

#[async_trait]
impl RevocationSet for NoopRevocationSet {
    async fn revoke(&self, _token_id: Uuid) -> AppResult<bool> {
        Ok(true)
    }

    async fn is_revoked(&self, _token_id: Uuid) -> AppResult<bool> {
        Ok(false)
    }
}

#[derive(Default)]
pub struct MemoryRevocationSet {
    revoked: RwLock<HashSet<Uuid>>,
}

impl MemoryRevocationSet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationSet for MemoryRevocationSet {
    async fn revoke(&self, token_id: Uuid) -> AppResult<bool> {
        Ok(self.revoked.write().await.insert(token_id))
    }

    async fn is_revoked(&self, token_id: Uuid) -> AppResult<bool> {
        Ok(self.revoked.read().await.contains(&token_id))
    }
}

#[derive(Clone)]
pub struct PgRevocationSet {
    db: PgPool,
}

impl PgRevocationSet {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RevocationSet for PgRevocationSet {
    async fn revoke(&self, token_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti)
            VALUES ($1)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(token_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn is_revoked(&self, token_id: Uuid) -> AppResult<bool> {
        let hit: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT jti FROM revoked_tokens WHERE jti = $1"#)
                .bind(token_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(hit.is_some())
    }
}
