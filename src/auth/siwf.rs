//! Sign-In-With-Farcaster message parsing
//!
//! SIWF messages follow the EIP-4361 layout:
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account:
//! 0x...
//!
//! Farcaster Auth
//!
//! URI: https://example.com/login
//! Version: 1
//! Chain ID: 10
//! Nonce: abc123
//! Issued At: 2024-01-01T00:00:00Z
//! Resources:
//! - farcaster://fid/1234
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("Invalid regex"));

static FID_RESOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"farcaster://fid/(\d+)").expect("Invalid regex"));

const DOMAIN_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SiwfError {
    #[error("message contains no Ethereum address")]
    MissingAddress,

    #[error("invalid timestamp in field {0}")]
    InvalidTimestamp(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiwfMessage {
    pub domain: Option<String>,
    pub address: String,
    pub uri: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<u64>,
    pub nonce: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub resources: Vec<String>,
    pub fid: Option<i64>,
}

impl SiwfMessage {
    pub fn parse(message: &str) -> Result<Self, SiwfError> {
        let address = ADDRESS_RE
            .find(message)
            .map(|m| m.as_str().to_string())
            .ok_or(SiwfError::MissingAddress)?;

        let mut parsed = SiwfMessage {
            address,
            ..Default::default()
        };

        let mut in_resources = false;
        let mut fid_line = None;

        for (index, raw) in message.lines().enumerate() {
            let line = raw.trim();

            if index == 0 {
                if let Some(domain) = line.strip_suffix(DOMAIN_SUFFIX) {
                    parsed.domain = Some(domain.trim().to_string());
                    continue;
                }
            }

            if in_resources {
                if let Some(resource) = line.strip_prefix("- ") {
                    parsed.resources.push(resource.trim().to_string());
                    continue;
                }
                in_resources = false;
            }

            if line == "Resources:" {
                in_resources = true;
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "URI" => parsed.uri = Some(value.to_string()),
                "Version" => parsed.version = Some(value.to_string()),
                "Chain ID" => parsed.chain_id = value.parse().ok(),
                "Nonce" => parsed.nonce = Some(value.to_string()),
                "Issued At" => parsed.issued_at = Some(parse_time(value, "Issued At")?),
                "Expiration Time" => {
                    parsed.expiration_time = Some(parse_time(value, "Expiration Time")?)
                }
                "Not Before" => parsed.not_before = Some(parse_time(value, "Not Before")?),
                "FID" => fid_line = value.parse::<i64>().ok(),
                _ => {}
            }
        }

        parsed.fid = parsed
            .resources
            .iter()
            .find_map(|r| fid_from_resource(r))
            .or_else(|| fid_from_resource(message))
            .or(fid_line)
            .filter(|fid| *fid > 0);

        Ok(parsed)
    }

    /// Whether `now` falls inside the message's validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let not_expired = self.expiration_time.map_or(true, |exp| now < exp);
        let started = self.not_before.map_or(true, |nbf| now >= nbf);
        not_expired && started
    }
}

fn fid_from_resource(text: &str) -> Option<i64> {
    FID_RESOURCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_time(value: &str, field: &'static str) -> Result<DateTime<Utc>, SiwfError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| SiwfError::InvalidTimestamp(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ADDRESS: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn sample_message() -> String {
        format!(
            "ephemnotes.app wants you to sign in with your Ethereum account:\n\
             {ADDRESS}\n\
             \n\
             Farcaster Auth\n\
             \n\
             URI: https://ephemnotes.app/login\n\
             Version: 1\n\
             Chain ID: 10\n\
             Nonce: abc12345\n\
             Issued At: 2024-05-01T12:00:00Z\n\
             Expiration Time: 2024-05-01T12:10:00Z\n\
             Resources:\n\
             - farcaster://fid/4321"
        )
    }

    #[test]
    fn test_parse_full_message() {
        let parsed = SiwfMessage::parse(&sample_message()).unwrap();

        assert_eq!(parsed.domain.as_deref(), Some("ephemnotes.app"));
        assert_eq!(parsed.address, ADDRESS);
        assert_eq!(parsed.uri.as_deref(), Some("https://ephemnotes.app/login"));
        assert_eq!(parsed.version.as_deref(), Some("1"));
        assert_eq!(parsed.chain_id, Some(10));
        assert_eq!(parsed.nonce.as_deref(), Some("abc12345"));
        assert_eq!(parsed.resources, vec!["farcaster://fid/4321".to_string()]);
        assert_eq!(parsed.fid, Some(4321));
        assert!(parsed.issued_at.is_some());
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let result = SiwfMessage::parse("example.com wants you to sign in\nNonce: 1");
        assert_eq!(result.unwrap_err(), SiwfError::MissingAddress);
    }

    #[test]
    fn test_message_without_fid_has_none() {
        let parsed = SiwfMessage::parse(&format!("sign in please {ADDRESS}")).unwrap();
        assert_eq!(parsed.address, ADDRESS);
        assert_eq!(parsed.fid, None);
        assert_eq!(parsed.domain, None);
    }

    #[test]
    fn test_fid_line_fallback() {
        let parsed = SiwfMessage::parse(&format!("{ADDRESS}\nFID: 77")).unwrap();
        assert_eq!(parsed.fid, Some(77));
    }

    #[test]
    fn test_invalid_timestamp() {
        let result = SiwfMessage::parse(&format!("{ADDRESS}\nExpiration Time: tomorrow"));
        assert_eq!(
            result.unwrap_err(),
            SiwfError::InvalidTimestamp("Expiration Time")
        );
    }

    #[test]
    fn test_validity_window() {
        let parsed = SiwfMessage::parse(&sample_message()).unwrap();
        let issued = parsed.issued_at.unwrap();

        assert!(parsed.is_valid_at(issued + Duration::minutes(5)));
        assert!(!parsed.is_valid_at(issued + Duration::minutes(11)));

        let open_ended = SiwfMessage::parse(ADDRESS).unwrap();
        assert!(open_ended.is_valid_at(Utc::now()));
    }
}
