//! Application session tokens

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{error, warn};

use super::models::{AuthResponse, AuthUser, ExternalIdentity, SessionClaims, SessionUser};
use crate::common::ApiError;

/// Audience and role expected by Supabase row-level security
pub const SESSION_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token encoding failed: {0}")]
    Encoding(jsonwebtoken::errors::Error),

    #[error("session lifetime out of range")]
    Lifetime,

    #[error("invalid session token")]
    Invalid,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Encoding(_) | SessionError::Lifetime => {
                ApiError::AuthenticationFailure("Authentication failed".to_string())
            }
            SessionError::Invalid => ApiError::InvalidCredential("Invalid session".to_string()),
        }
    }
}

pub struct SessionIssuer<'a> {
    secret: &'a str,
    ttl: Option<Duration>,
}

impl<'a> SessionIssuer<'a> {
    pub fn new(secret: &'a str, ttl_hours: i64) -> Self {
        Self {
            secret,
            ttl: Duration::try_hours(ttl_hours),
        }
    }

    pub fn issue(
        &self,
        user: &AuthUser,
        identity: &ExternalIdentity,
    ) -> Result<AuthResponse, SessionError> {
        self.issue_at(user, identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        user: &AuthUser,
        identity: &ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, SessionError> {
        let username = identity.username.clone().or_else(|| {
            user.user_metadata
                .get("username")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        let expires_at = self
            .ttl
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                error!(user_id = %user.id, "Session lifetime overflows the clock");
                SessionError::Lifetime
            })?;

        let claims = SessionClaims {
            sub: user.id.clone(),
            fid: identity.fid,
            username,
            email: user.email.clone(),
            role: SESSION_AUDIENCE.to_string(),
            aud: SESSION_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "JWT encoding error during session issuance");
            SessionError::Encoding(e)
        })?;

        Ok(AuthResponse {
            access_token,
            user: SessionUser::from(user),
        })
    }
}

/// Validates signature, expiry and audience of a session token.
pub fn validate_session(token: &str, secret: &str) -> Result<SessionClaims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SESSION_AUDIENCE]);

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!(error = %e, "Session token validation failed");
        SessionError::Invalid
    })
}
