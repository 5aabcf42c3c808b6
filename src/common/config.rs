// src/common/config.rs
//! Runtime configuration for the Farcaster auth bridge
//!
//! Secrets are optional at startup on purpose: a missing secret surfaces as a
//! 500 on the request that needs it rather than a crash loop.

use std::env;
use std::time::Duration;

pub const DEFAULT_EMAIL_DOMAIN: &str = "ephemnotes.app";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
pub const DEFAULT_SUPABASE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared secret for Quick Auth tokens (`FARCASTER_JWT_SECRET`)
    pub farcaster_jwt_secret: Option<String>,
    /// Provider admin key (`SUPABASE_SERVICE_ROLE_KEY`)
    pub service_role_key: Option<String>,
    /// Dedicated session signing secret (`SESSION_JWT_SECRET`)
    pub session_jwt_secret: Option<String>,
    pub session_ttl_hours: i64,
    /// Domain used to build `fid-<fid>@farcaster.<domain>`
    pub email_domain: String,
    pub quick_auth_audience: Option<String>,
    pub siwf_domain: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let session_ttl_hours = get("SESSION_TTL_HOURS")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| (1..=MAX_SESSION_TTL_HOURS).contains(h))
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        Self {
            farcaster_jwt_secret: get("FARCASTER_JWT_SECRET"),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            session_jwt_secret: get("SESSION_JWT_SECRET"),
            session_ttl_hours,
            email_domain: get("FARCASTER_EMAIL_DOMAIN")
                .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string()),
            quick_auth_audience: get("FARCASTER_QUICK_AUTH_AUDIENCE"),
            siwf_domain: get("FARCASTER_SIWF_DOMAIN"),
        }
    }

    /// Secret used to sign and validate application sessions.
    pub fn session_secret(&self) -> Option<&str> {
        self.session_jwt_secret
            .as_deref()
            .or(self.farcaster_jwt_secret.as_deref())
    }

    /// Secrets for a login, or the names of the missing required settings.
    pub fn login_secrets(&self) -> Result<LoginSecrets<'_>, Vec<&'static str>> {
        match (self.farcaster_jwt_secret.as_deref(), &self.service_role_key) {
            (Some(farcaster), Some(_)) => Ok(LoginSecrets {
                farcaster,
                session: self.session_jwt_secret.as_deref().unwrap_or(farcaster),
            }),
            _ => Err(self.missing_required()),
        }
    }

    /// Names of required settings that are missing, in a stable order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.farcaster_jwt_secret.is_none() {
            missing.push("FARCASTER_JWT_SECRET");
        }
        if self.service_role_key.is_none() {
            missing.push("SUPABASE_SERVICE_ROLE_KEY");
        }
        missing
    }
}

/// Secrets a login request signs and verifies with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginSecrets<'a> {
    pub farcaster: &'a str,
    pub session: &'a str,
}

/// Where identities live: the hosted provider or a local SQLite file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase { url: String, timeout: Duration },
    Sqlite { database_url: String },
}

impl StoreBackend {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("SUPABASE_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => {
                let timeout_secs = lookup("SUPABASE_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_SUPABASE_TIMEOUT_SECS);
                StoreBackend::Supabase {
                    url: url.trim().trim_end_matches('/').to_string(),
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            None => StoreBackend::Sqlite {
                database_url: lookup("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://ephemnotes.db".to_string()),
            },
        }
    }
}
