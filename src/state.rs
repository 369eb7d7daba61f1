use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::{
    jwt::JwtKeys,
    repo::{MemoryUserStore, PgUserStore, UserStore},
    revocation::{MemoryRevocationSet, NoopRevocationSet, PgRevocationSet, RevocationSet},
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub jwt: JwtKeys,
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let Some(database_url) = config.database_url.clone() else {
            tracing::warn!("DATABASE_URL not set; users and revocations are kept in memory");
            return Self::in_memory(config);
        };

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("connect to database")?;

        let revocations: Arc<dyn RevocationSet> = if config.jwt.blacklist_after_rotation {
            Arc::new(PgRevocationSet::new(db.clone()))
        } else {
            Arc::new(NoopRevocationSet)
        };
        let jwt = JwtKeys::new(&config.jwt, revocations)?;

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(PgUserStore::new(db.clone())),
            jwt,
            db: Some(db),
        })
    }

    /// No database: process-local stores. Used by tests and local runs.
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        let revocations: Arc<dyn RevocationSet> = if config.jwt.blacklist_after_rotation {
            Arc::new(MemoryRevocationSet::new())
        } else {
            Arc::new(NoopRevocationSet)
        };
        let jwt = JwtKeys::new(&config.jwt, revocations)?;

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(MemoryUserStore::new()),
            jwt,
            db: None,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig {
            bind_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test-secret-that-is-long-enough-32b".into(),
                algorithm: "HS256".into(),
                issuer: None,
                audience: None,
                ttl_minutes: 5,
                refresh_ttl_minutes: 60 * 24,
                refresh_enabled: false,
                blacklist_after_rotation: false,
            },
        };
        Self::in_memory(config).expect("in-memory state")
    }
}
