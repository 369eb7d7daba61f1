use std::sync::Arc;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Claims, Identity, TokenKind},
        revocation::RevocationSet,
    },
    config::JwtConfig,
    error::{AppResult, TokenError},
    state::AppState,
};

/// Signing/verification keys plus the token policy from `JwtConfig`.
/// Built once at startup; cloning is cheap.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    refresh_enabled: bool,
    blacklist_after_rotation: bool,
    revocations: Arc<dyn RevocationSet>,
}

/// Tokens handed out at login and on rotation.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig, revocations: Arc<dyn RevocationSet>) -> anyhow::Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm()?,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes),
            refresh_enabled: cfg.refresh_enabled,
            blacklist_after_rotation: cfg.blacklist_after_rotation,
            revocations,
        })
    }

    pub(crate) fn sign_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("token lifetime {ttl} overflows the clock"))?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            jti: Uuid::new_v4(),
            kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(user_id = %user_id, jti = %claims.jti, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_at(user_id, TokenKind::Access, OffsetDateTime::now_utc())
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_at(user_id, TokenKind::Refresh, OffsetDateTime::now_utc())
    }

    /// Access token, plus a refresh token when those are enabled.
    pub fn sign_pair(&self, user_id: Uuid) -> anyhow::Result<TokenPair> {
        let refresh_token = if self.refresh_enabled {
            Some(self.sign_refresh(user_id)?)
        } else {
            None
        };
        Ok(TokenPair {
            access_token: self.sign_access(user_id)?,
            refresh_token,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        // expiry is checked against our own clock in `decode_at`
        validation.validate_exp = false;
        validation.leeway = 0;
        if let Some(iss) = &self.issuer {
            validation.set_issuer(std::slice::from_ref(iss));
        }
        if let Some(aud) = &self.audience {
            validation.set_audience(std::slice::from_ref(aud));
        }
        validation
    }

    /// Signature, then expiry. Does not consult the revocation set.
    fn decode_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::Invalid
        })?;
        if now.unix_timestamp() >= data.claims.exp {
            debug!(jti = %data.claims.jti, "jwt expired");
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    pub async fn verify_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> AppResult<Claims> {
        let claims = self.decode_at(token, now)?;
        if self.revocations.is_revoked(claims.jti).await? {
            warn!(user_id = %claims.sub, jti = %claims.jti, "revoked token presented");
            return Err(TokenError::Revoked.into());
        }
        if claims.kind != kind {
            debug!(expected = ?kind, got = ?claims.kind, "wrong token kind");
            return Err(TokenError::Invalid.into());
        }
        debug!(user_id = %claims.sub, kind = ?claims.kind, "jwt verified");
        Ok(claims)
    }

    pub async fn verify(&self, token: &str, kind: TokenKind) -> AppResult<Claims> {
        self.verify_at(token, kind, OffsetDateTime::now_utc()).await
    }

    pub async fn verify_refresh(&self, token: &str) -> AppResult<Claims> {
        self.verify(token, TokenKind::Refresh).await
    }

    /// Gate for protected routes: takes the raw `Authorization` header value.
    pub async fn verify_bearer(&self, header: Option<&str>) -> AppResult<Identity> {
        let token = header.and_then(parse_bearer).ok_or(TokenError::Invalid)?;
        let claims = self.verify(token, TokenKind::Access).await?;
        Ok(Identity::from(&claims))
    }

    /// Exchange a refresh token for a fresh pair. With blacklisting enabled
    /// the presented refresh token cannot be used again: of several
    /// concurrent rotations only the one whose revoke inserted the `jti` wins.
    pub async fn rotate(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.verify_refresh(refresh_token).await?;
        if self.blacklist_after_rotation {
            if !self.revocations.revoke(claims.jti).await? {
                warn!(user_id = %claims.sub, jti = %claims.jti, "refresh token reused during rotation");
                return Err(TokenError::Revoked.into());
            }
            debug!(user_id = %claims.sub, jti = %claims.jti, "refresh token blacklisted");
        }
        Ok(TokenPair {
            access_token: self.sign_access(claims.sub)?,
            refresh_token: Some(self.sign_refresh(claims.sub)?),
        })
    }

    /// Record a still-valid token of either kind as revoked.
    pub async fn revoke(&self, token: &str) -> AppResult<()> {
        let claims = self.decode_at(token, OffsetDateTime::now_utc())?;
        self.revocations.revoke(claims.jti).await?;
        Ok(())
    }
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}
