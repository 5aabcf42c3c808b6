// src/services/identity_store.rs
//
// Storage seam for Farcaster identities: the auth provider's user records and
// the `profiles` table that links them to FIDs.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::models::{AuthUser, NewAuthUser, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outcome of an insert guarded by the `fid` uniqueness constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileInsert {
    Inserted(UserProfile),
    AlreadyExists,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns `None` when no profile carries this FID.
    async fn find_profile_by_fid(&self, fid: i64) -> Result<Option<UserProfile>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is already registered.
    async fn create_auth_user(&self, new_user: &NewAuthUser) -> Result<AuthUser, StoreError>;

    async fn get_auth_user(&self, id: &str) -> Result<Option<AuthUser>, StoreError>;

    /// Inserts the row unless a profile with the same FID exists, in one round trip.
    async fn insert_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<ProfileInsert, StoreError>;

    async fn delete_auth_user(&self, id: &str) -> Result<(), StoreError>;
}
