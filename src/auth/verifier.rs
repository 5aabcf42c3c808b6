//! Credential verification for the two Farcaster login modes

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{ExternalIdentity, QuickAuthClaims};
use super::session::SESSION_AUDIENCE;
use super::siwf::{SiwfError, SiwfMessage};
use crate::common::{safe_address_log, ApiError};
use crate::services::signature::SignatureVerifier;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid SIWF message: {0}")]
    MalformedMessage(#[from] SiwfError),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Message expired or not yet valid")]
    OutsideValidity,

    #[error("Message domain mismatch")]
    DomainMismatch,

    #[error("Could not resolve Farcaster ID from message")]
    UnresolvedIdentity,
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedMessage(_) => {
                ApiError::MalformedRequest("Invalid SIWF message".to_string())
            }
            VerificationError::UnresolvedIdentity => ApiError::UnresolvedIdentity(err.to_string()),
            VerificationError::InvalidToken
            | VerificationError::InvalidSignature
            | VerificationError::OutsideValidity
            | VerificationError::DomainMismatch => ApiError::InvalidCredential(err.to_string()),
        }
    }
}

/// Validates a Quick Auth JWT (HS256, `exp` required) and extracts the FID.
pub fn verify_quick_token(
    token: &str,
    secret: &str,
    audience: Option<&str>,
) -> Result<ExternalIdentity, VerificationError> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(aud) = audience {
        validation.set_audience(&[aud]);
    }

    let decoded = decode::<QuickAuthClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        warn!(error = %e, "Quick Auth token validation failed");
        VerificationError::InvalidToken
    })?;

    if decoded.claims.is_audience(SESSION_AUDIENCE) {
        warn!("Application session token presented as a Quick Auth token");
        return Err(VerificationError::InvalidToken);
    }

    let fid = decoded.claims.resolved_fid().ok_or_else(|| {
        warn!("Quick Auth token carries no usable FID");
        VerificationError::InvalidToken
    })?;

    debug!(fid = fid, "Quick Auth token verified");

    Ok(ExternalIdentity {
        fid,
        username: decoded.claims.username.filter(|u| !u.trim().is_empty()),
        address: None,
    })
}

/// Verifies a SIWF message and its wallet signature.
///
/// Checks run in order: address, signature, validity window, domain, FID.
pub fn verify_siwf(
    message: &str,
    signature: &str,
    verifier: &dyn SignatureVerifier,
    expected_domain: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ExternalIdentity, VerificationError> {
    let parsed = SiwfMessage::parse(message).map_err(|e| {
        warn!(error = %e, "Could not parse SIWF message");
        VerificationError::MalformedMessage(e)
    })?;

    match verifier.verify(message, signature, &parsed.address) {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                address = %safe_address_log(&parsed.address),
                "SIWF signature does not match message address"
            );
            return Err(VerificationError::InvalidSignature);
        }
        Err(e) => {
            warn!(error = %e, "SIWF signature could not be checked");
            return Err(VerificationError::InvalidSignature);
        }
    }

    if !parsed.is_valid_at(now) {
        warn!(
            expiration_time = ?parsed.expiration_time,
            not_before = ?parsed.not_before,
            "SIWF message outside its validity window"
        );
        return Err(VerificationError::OutsideValidity);
    }

    if let Some(expected) = expected_domain {
        let matches = parsed
            .domain
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(expected));
        if !matches {
            warn!(
                message_domain = ?parsed.domain,
                expected_domain = %expected,
                "SIWF message domain mismatch"
            );
            return Err(VerificationError::DomainMismatch);
        }
    }

    let fid = parsed.fid.ok_or_else(|| {
        warn!(
            address = %safe_address_log(&parsed.address),
            "SIWF message verified but carries no FID"
        );
        VerificationError::UnresolvedIdentity
    })?;

    debug!(
        fid = fid,
        uri = ?parsed.uri,
        version = ?parsed.version,
        chain_id = ?parsed.chain_id,
        nonce = ?parsed.nonce,
        issued_at = ?parsed.issued_at,
        resources = parsed.resources.len(),
        "SIWF message verified"
    );

    Ok(ExternalIdentity {
        fid,
        username: None,
        address: Some(parsed.address.to_lowercase()),
    })
}
