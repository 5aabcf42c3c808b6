//! # Auth Module
//!
//! Farcaster sign-in for EphemNotes:
//! - Quick Auth JWT and SIWF message verification
//! - Identity reconciliation against the profile table
//! - Session token issuance and the `AuthedUser` extractor

pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod reconciler;
pub mod routes;
pub mod session;
pub mod siwf;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use routes::auth_routes;
