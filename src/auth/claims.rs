use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: i64,        // issued at (unix timestamp)
    pub exp: i64,        // expires at (unix timestamp)
    pub jti: Uuid,       // token ID, key of the revocation set
    pub kind: TokenKind, // token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Caller identity resolved from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub token_id: Uuid,
}

impl From<&Claims> for Identity {
    fn from(c: &Claims) -> Self {
        Self {
            user_id: c.sub,
            token_id: c.jti,
        }
    }
}
