//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::session::validate_session;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated caller extractor
///
/// Validates an application session token issued by the Farcaster login
/// endpoint. The token is self-contained, so no store lookup is made.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub fid: i64,
    pub username: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::MissingServerConfig("missing app state".to_string()))?;

        let secret = {
            let app_state = state_lock.read().await;
            app_state
                .config
                .session_secret()
                .map(str::to_string)
                .ok_or_else(|| ApiError::MissingServerConfig("SESSION_JWT_SECRET".to_string()))?
        };

        let token = match parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        {
            Some(t) => t,
            None => {
                warn!("Authentication failed: missing Authorization header");
                return Err(ApiError::InvalidCredential(
                    "Missing authorization".to_string(),
                ));
            }
        };

        let bare_token = bearer_token(token);

        let claims = validate_session(bare_token, &secret)?;

        debug!(
            user_id = %claims.sub,
            fid = claims.fid,
            email = %safe_email_log(&claims.email),
            "Session authentication successful via extractor"
        );

        Ok(AuthedUser {
            id: claims.sub,
            email: claims.email,
            fid: claims.fid,
            username: claims.username,
        })
    }
}

/// Token from `Bearer <token>` (scheme matched case-insensitively) or a raw token
fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => header,
    }
}
