// Application state shared across all modules

use std::sync::Arc;

use crate::common::config::AuthConfig;
use crate::services::{IdentityStore, SignatureVerifier};

/// Application state containing the identity store, verifiers and configuration
#[derive(Clone)]
pub struct AppState {
    /// `None` when the provider could not be configured at startup
    pub identity_store: Option<Arc<dyn IdentityStore>>,
    pub signature_verifier: Arc<dyn SignatureVerifier>,
    pub config: AuthConfig,
}
