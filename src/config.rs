use std::net::SocketAddr;

use anyhow::Context;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

const MIN_SECRET_LEN: usize = 32;
/// One year; anything longer is a typo, and far larger values overflow the clock.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// Login also hands out a refresh token.
    pub refresh_enabled: bool,
    /// Rotating a refresh token revokes the old one.
    pub blacklist_after_rotation: bool,
}

impl JwtConfig {
    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        match self.algorithm.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => anyhow::bail!("unsupported JWT_ALGORITHM {other}: expected HS256, HS384 or HS512"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("APP_PORT").unwrap_or_else(|| "8080".into());
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid APP_HOST/APP_PORT {host}:{port}"))?;

        let database_url = var("DATABASE_URL").filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: var("JWT_SECRET")
                .filter(|v| !v.is_empty())
                .context("JWT_SECRET must be set")?,
            algorithm: var("JWT_ALGORITHM").unwrap_or_else(|| "HS256".into()),
            issuer: var("JWT_ISSUER").filter(|v| !v.is_empty()),
            audience: var("JWT_AUDIENCE").filter(|v| !v.is_empty()),
            ttl_minutes: parse_or(&var, "JWT_ACCESS_TTL_MINUTES", 5)?,
            refresh_ttl_minutes: parse_or(&var, "JWT_REFRESH_TTL_MINUTES", 60 * 24)?,
            refresh_enabled: parse_or(&var, "JWT_REFRESH_ENABLED", false)?,
            blacklist_after_rotation: parse_or(&var, "JWT_BLACKLIST_AFTER_ROTATION", false)?,
        };

        jwt.algorithm()?;
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&jwt.ttl_minutes),
            "JWT_ACCESS_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&jwt.refresh_ttl_minutes),
            "JWT_REFRESH_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );
        if jwt.secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                len = jwt.secret.len(),
                min = MIN_SECRET_LEN,
                "JWT_SECRET is shorter than recommended"
            );
        }

        Ok(Self {
            bind_addr,
            database_url,
            jwt,
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = load(&[("JWT_SECRET", "s3cr3t")]).expect("config");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.jwt.ttl_minutes, 5);
        assert_eq!(cfg.jwt.refresh_ttl_minutes, 1440);
        assert_eq!(cfg.jwt.algorithm().unwrap(), Algorithm::HS256);
        assert!(!cfg.jwt.refresh_enabled);
        assert!(!cfg.jwt.blacklist_after_rotation);
        assert!(cfg.jwt.issuer.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("JWT_SECRET", "s3cr3t"),
            ("JWT_ALGORITHM", "hs512"),
            ("JWT_ACCESS_TTL_MINUTES", "15"),
            ("JWT_REFRESH_ENABLED", "true"),
            ("JWT_BLACKLIST_AFTER_ROTATION", "true"),
            ("JWT_ISSUER", "authgate"),
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "9000"),
        ])
        .expect("config");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/auth"));
        assert_eq!(cfg.jwt.algorithm().unwrap(), Algorithm::HS512);
        assert_eq!(cfg.jwt.ttl_minutes, 15);
        assert!(cfg.jwt.refresh_enabled);
        assert!(cfg.jwt.blacklist_after_rotation);
        assert_eq!(cfg.jwt.issuer.as_deref(), Some("authgate"));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn rejects_lifetimes_that_would_overflow_the_clock() {
        let err = load(&[("JWT_SECRET", "x"), ("JWT_ACCESS_TTL_MINUTES", "10000000000")])
            .unwrap_err();
        assert!(err.to_string().contains("JWT_ACCESS_TTL_MINUTES"));
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_REFRESH_TTL_MINUTES", "10000000000")]).is_err());

        let max = MAX_TTL_MINUTES.to_string();
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_REFRESH_TTL_MINUTES", max.as_str())]).is_ok());
    }

    #[test]
    fn rejects_bad_bind_address() {
        assert!(load(&[("JWT_SECRET", "x"), ("APP_PORT", "http")]).is_err());
    }

    #[test]
    fn rejects_asymmetric_algorithm_and_bad_numbers() {
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_ALGORITHM", "RS256")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_ACCESS_TTL_MINUTES", "soon")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_ACCESS_TTL_MINUTES", "0")]).is_err());
    }
}
