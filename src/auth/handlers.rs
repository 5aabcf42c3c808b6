//! Authentication handlers

use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::AuthedUser;
use super::metrics::AuthMetrics;
use super::models::{AuthResponse, FarcasterAuthRequest};
use super::reconciler::IdentityReconciler;
use super::session::SessionIssuer;
use super::verifier::{verify_quick_token, verify_siwf};
use crate::common::{safe_email_log, ApiError, AppState};

/// POST /api/auth/farcaster
/// Authenticates a Farcaster user via Quick Auth or Sign-In-With-Farcaster
///
/// # Request Body
/// ```json
/// { "type": "quick", "token": "<quick auth jwt>" }
/// { "type": "siwf", "message": "<siwf message>", "signature": "0x..." }
/// ```
///
/// # Response
/// `201` for a newly registered FID, `200` otherwise:
/// ```json
/// {
///   "access_token": "<jwt token>",
///   "user": { "id": "...", "email": "...", "user_metadata": { "fid": 1 } }
/// }
/// ```
pub async fn farcaster_auth(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    info!("🔐 Received Farcaster auth request");
    let state = state_lock.read().await.clone();
    let metrics = AuthMetrics;

    let result = authenticate(&state, &body, metrics).await;

    match &result {
        Ok((status, _)) if *status == StatusCode::CREATED => metrics.outcome("created"),
        Ok(_) => metrics.outcome("existing"),
        Err(e) => metrics.outcome(&e.status().as_u16().to_string()),
    }

    result.map(|(status, response)| (status, Json(response)))
}

async fn authenticate(
    state: &AppState,
    body: &[u8],
    metrics: AuthMetrics,
) -> Result<(StatusCode, AuthResponse), ApiError> {
    let request = FarcasterAuthRequest::parse(body).map_err(|e| {
        warn!(error = %e, "Rejected Farcaster auth request body");
        ApiError::from(e)
    })?;

    let mode = request.mode();
    metrics.request_received(mode);
    debug!(mode = mode, "Farcaster auth request parsed");

    let secrets = state
        .config
        .login_secrets()
        .map_err(|missing| ApiError::MissingServerConfig(missing.join(", ")))?;

    let store = state.identity_store.as_ref().ok_or_else(|| {
        ApiError::MissingServerConfig("identity store not initialized".to_string())
    })?;

    let identity = match &request {
        FarcasterAuthRequest::Quick { token } => verify_quick_token(
            token,
            secrets.farcaster,
            state.config.quick_auth_audience.as_deref(),
        )?,
        FarcasterAuthRequest::Siwf { message, signature } => verify_siwf(
            message,
            signature,
            state.signature_verifier.as_ref(),
            state.config.siwf_domain.as_deref(),
            Utc::now(),
        )?,
    };

    let reconciled = IdentityReconciler::new(store.as_ref(), &state.config.email_domain)
        .reconcile(&identity)
        .await?;

    let response = SessionIssuer::new(secrets.session, state.config.session_ttl_hours)
        .issue(reconciled.user(), &identity)?;

    let status = if reconciled.is_new() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    info!(
        user_id = %response.user.id,
        fid = identity.fid,
        email = %safe_email_log(&response.user.email),
        mode = mode,
        new_user = reconciled.is_new(),
        "User authentication successful via Farcaster"
    );

    Ok((status, response))
}

/// GET /api/me
/// Returns the identity carried by the caller's session token
///
/// # Response
/// ```json
/// {
///   "user": { "id": "...", "email": "...", "fid": 1, "username": "..." }
/// }
/// ```
pub async fn me_handler(authed: AuthedUser) -> Result<Json<serde_json::Value>, ApiError> {
    debug!(user_id = %authed.id, fid = authed.fid, "Session introspection");
    let resp = serde_json::json!({
        "user": {
            "id": authed.id,
            "email": authed.email,
            "fid": authed.fid,
            "username": authed.username,
        }
    });
    Ok(Json(resp))
}

/// GET /health
pub async fn health_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Json<serde_json::Value> {
    let state = state_lock.read().await;
    let missing = state.config.missing_required();
    if !missing.is_empty() {
        error!(missing = ?missing, "Health check: server configuration incomplete");
    }
    Json(serde_json::json!({
        "status": "ok",
        "configured": missing.is_empty() && state.identity_store.is_some(),
    }))
}
