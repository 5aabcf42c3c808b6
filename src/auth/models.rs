//! Authentication data models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;

use crate::common::ApiError;

/// Identity asserted by a verified Farcaster credential. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub fid: i64,
    pub username: Option<String>,
    pub address: Option<String>,
}

impl ExternalIdentity {
    /// Username stored on the profile row, which requires one.
    pub fn profile_username(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| format!("fid-{}", self.fid))
    }
}

/// Row of the `profiles` table, keyed by the auth user id and unique on `fid`
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub fid: i64,
    pub username: String,
}

/// Account record owned by the auth provider
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    pub fn metadata_fid(&self) -> Option<i64> {
        self.user_metadata.get("fid").and_then(Value::as_i64)
    }
}

/// Metadata written to the provider when a Farcaster account is created
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserMetadata {
    pub fid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Admin-API payload for a new auth user
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewAuthUser {
    pub email: String,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}

impl NewAuthUser {
    pub fn for_identity(identity: &ExternalIdentity, email_domain: &str) -> Self {
        Self {
            email: synthetic_email(identity.fid, email_domain),
            email_confirm: true,
            user_metadata: UserMetadata {
                fid: identity.fid,
                username: identity.username.clone(),
                address: identity.address.clone(),
            },
        }
    }
}

/// The provider requires an email, so Farcaster accounts get a placeholder one.
pub fn synthetic_email(fid: i64, domain: &str) -> String {
    format!("fid-{}@farcaster.{}", fid, domain)
}

/// Claims of a Farcaster Quick Auth token. Validation-only claims such as
/// `exp` are checked by the decoder and not kept here.
#[derive(Deserialize, Debug)]
pub struct QuickAuthClaims {
    #[serde(default)]
    pub fid: Option<Value>,
    #[serde(default)]
    pub sub: Option<Value>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub aud: Option<Value>,
    #[serde(default)]
    pub role: Option<String>,
}

impl QuickAuthClaims {
    /// True when the claims carry the `aud` or `role` this service stamps on
    /// its own sessions.
    pub fn is_audience(&self, audience: &str) -> bool {
        let in_aud = match &self.aud {
            Some(Value::String(aud)) => aud == audience,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(audience)),
            _ => false,
        };
        in_aud || self.role.as_deref() == Some(audience)
    }

    /// FID from the `fid` claim, falling back to a numeric `sub`.
    pub fn resolved_fid(&self) -> Option<i64> {
        self.fid
            .as_ref()
            .and_then(fid_from_value)
            .or_else(|| self.sub.as_ref().and_then(fid_from_value))
    }
}

fn fid_from_value(value: &Value) -> Option<i64> {
    let fid = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (fid > 0).then_some(fid)
}

/// Application session token claims
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub fid: i64,
    pub username: Option<String>,
    pub email: String,
    pub role: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// User object returned alongside a session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub user_metadata: Value,
}

impl From<&AuthUser> for SessionUser {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            user_metadata: user.user_metadata.clone(),
        }
    }
}

/// Body of a successful `POST /api/auth/farcaster`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: SessionUser,
}

/// Request body for `POST /api/auth/farcaster`, dispatched on its `type` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarcasterAuthRequest {
    Quick { token: String },
    Siwf { message: String, signature: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("Invalid authentication type")]
    InvalidType,

    #[error("Missing token")]
    MissingToken,

    #[error("Missing message or signature")]
    MissingSiwfFields,
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::MalformedRequest(err.to_string())
    }
}

impl FarcasterAuthRequest {
    /// Parses the raw body. Any JSON that is not an object with a known
    /// `type` and the matching non-empty string fields is rejected.
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| RequestError::InvalidBody)?;
        let object = value.as_object().ok_or(RequestError::InvalidBody)?;

        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        match object.get("type").and_then(Value::as_str) {
            Some("quick") => {
                let token = field("token").ok_or(RequestError::MissingToken)?;
                Ok(FarcasterAuthRequest::Quick { token })
            }
            Some("siwf") => match (field("message"), field("signature")) {
                (Some(message), Some(signature)) => {
                    Ok(FarcasterAuthRequest::Siwf { message, signature })
                }
                _ => Err(RequestError::MissingSiwfFields),
            },
            _ => Err(RequestError::InvalidType),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            FarcasterAuthRequest::Quick { .. } => "quick",
            FarcasterAuthRequest::Siwf { .. } => "siwf",
        }
    }
}
