// src/services/signature.rs
//! EIP-191 `personal_sign` signature verification
//!
//! Recovers the signer address from a 65-byte `r || s || v` signature over
//! `"\x19Ethereum Signed Message:\n" + len(message) + message` and compares it
//! with the address the message claims.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    Encoding,

    #[error("signature must be 65 bytes, got {0}")]
    Length(usize),

    #[error("invalid recovery id")]
    RecoveryId,

    #[error("public key recovery failed")]
    Recovery,
}

/// Verifies that `signature` over `message` was produced by `expected_address`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        message: &str,
        signature: &str,
        expected_address: &str,
    ) -> Result<bool, SignatureError>;
}

/// secp256k1 recovery based verifier for Ethereum wallets
#[derive(Debug, Default, Clone, Copy)]
pub struct Eip191Verifier;

impl SignatureVerifier for Eip191Verifier {
    fn verify(
        &self,
        message: &str,
        signature: &str,
        expected_address: &str,
    ) -> Result<bool, SignatureError> {
        let recovered = recover_address(message, signature)?;
        Ok(recovered.eq_ignore_ascii_case(expected_address.trim()))
    }
}

/// Keccak-256 of the EIP-191 prefixed message
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Recovers the lowercase `0x` address that signed `message`.
pub fn recover_address(message: &str, signature: &str) -> Result<String, SignatureError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part).map_err(|_| SignatureError::Encoding)?;

    let Some((rs, v)) = split_signature(&bytes) else {
        return Err(SignatureError::Length(bytes.len()));
    };

    let parity = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(SignatureError::RecoveryId),
    };

    let mut sig = Signature::from_slice(rs).map_err(|_| SignatureError::Recovery)?;
    let mut recovery_id = RecoveryId::from_byte(parity).ok_or(SignatureError::RecoveryId)?;

    // High-S signatures recover the same key with the parity flipped.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(&eip191_hash(message), &sig, recovery_id)
        .map_err(|_| SignatureError::Recovery)?;

    Ok(address_from_key(&key))
}

fn split_signature(bytes: &[u8]) -> Option<(&[u8], u8)> {
    match bytes.len() {
        65 => bytes.split_last().map(|(v, rs)| (rs, *v)),
        _ => None,
    }
}

/// Ethereum address of a secp256k1 public key
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}
