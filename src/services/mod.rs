// src/services/mod.rs
//
// Identity storage backends and signature verification used by the auth module

pub mod identity_store;
pub mod signature;
pub mod sqlite_store;
pub mod supabase;

// Re-export commonly used types for convenience
pub use identity_store::IdentityStore;
pub use signature::{Eip191Verifier, SignatureVerifier};
pub use sqlite_store::SqliteIdentityStore;
pub use supabase::SupabaseStore;
