//! Maps a verified Farcaster identity onto an auth user, registering it on first sight

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::metrics::AuthMetrics;
use super::models::{AuthUser, ExternalIdentity, NewAuthUser, UserProfile};
use crate::common::{safe_email_log, ApiError};
use crate::services::identity_store::{IdentityStore, ProfileInsert, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("identity lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("profile {0} has no linked auth user")]
    MissingAuthUser(String),

    #[error("identity creation failed: {0}")]
    Creation(String),
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Creation(_) => {
                ApiError::IdentityCreationFailure("Failed to create user".to_string())
            }
            ReconcileError::Lookup(_) | ReconcileError::MissingAuthUser(_) => {
                ApiError::AuthenticationFailure("Authentication failed".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Existing(AuthUser),
    Created(AuthUser),
}

impl Reconciled {
    pub fn user(&self) -> &AuthUser {
        match self {
            Reconciled::Existing(user) | Reconciled::Created(user) => user,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Reconciled::Created(_))
    }
}

pub struct IdentityReconciler<'a> {
    store: &'a dyn IdentityStore,
    email_domain: &'a str,
    metrics: AuthMetrics,
}

impl<'a> IdentityReconciler<'a> {
    pub fn new(store: &'a dyn IdentityStore, email_domain: &'a str) -> Self {
        Self {
            store,
            email_domain,
            metrics: AuthMetrics,
        }
    }

    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<Reconciled, ReconcileError> {
        let fid = identity.fid;

        let existing = self.store.find_profile_by_fid(fid).await.map_err(|e| {
            error!(error = %e, fid = fid, "Database error looking up Farcaster profile");
            ReconcileError::Lookup(e)
        })?;

        if let Some(profile) = existing {
            debug!(fid = fid, user_id = %profile.id, "Found existing Farcaster profile");
            return self.linked_user(&profile).await.map(Reconciled::Existing);
        }

        debug!(fid = fid, "No profile for FID, registering new identity");
        self.register(identity).await
    }

    async fn linked_user(&self, profile: &UserProfile) -> Result<AuthUser, ReconcileError> {
        match self.store.get_auth_user(&profile.id).await {
            Ok(Some(user)) => {
                if let Some(metadata_fid) = user.metadata_fid().filter(|f| *f != profile.fid) {
                    warn!(
                        fid = profile.fid,
                        metadata_fid = metadata_fid,
                        user_id = %user.id,
                        drift = "metadata_fid_mismatch",
                        "Auth user metadata disagrees with its profile FID"
                    );
                }
                Ok(user)
            }
            Ok(None) => {
                error!(
                    fid = profile.fid,
                    user_id = %profile.id,
                    "Profile references a missing auth user"
                );
                Err(ReconcileError::MissingAuthUser(profile.id.clone()))
            }
            Err(e) => {
                error!(error = %e, user_id = %profile.id, "Failed to fetch auth user");
                Err(ReconcileError::Lookup(e))
            }
        }
    }

    async fn register(&self, identity: &ExternalIdentity) -> Result<Reconciled, ReconcileError> {
        let fid = identity.fid;
        let new_user = NewAuthUser::for_identity(identity, self.email_domain);

        let user = match self.store.create_auth_user(&new_user).await {
            Ok(user) => user,
            Err(StoreError::Conflict) => return self.adopt_existing(fid).await,
            Err(e) => {
                error!(
                    error = %e,
                    fid = fid,
                    email = %safe_email_log(&new_user.email),
                    "Failed to create auth user for Farcaster identity"
                );
                return Err(ReconcileError::Creation(e.to_string()));
            }
        };

        let profile = UserProfile {
            id: user.id.clone(),
            fid,
            username: identity.profile_username(),
        };

        match self.store.insert_profile_if_absent(&profile).await {
            Ok(ProfileInsert::Inserted(_)) => {
                info!(fid = fid, user_id = %user.id, "Registered new Farcaster identity");
                Ok(Reconciled::Created(user))
            }
            Ok(ProfileInsert::AlreadyExists) => {
                self.metrics.registration_race_lost();
                warn!(
                    fid = fid,
                    orphan_user_id = %user.id,
                    "Profile for FID was registered concurrently, discarding duplicate auth user"
                );
                if let Err(e) = self.store.delete_auth_user(&user.id).await {
                    warn!(error = %e, orphan_user_id = %user.id, "Failed to delete duplicate auth user");
                }
                self.adopt_existing(fid).await
            }
            Err(e) => {
                // The auth user exists, so the login still succeeds without its profile row.
                self.metrics.profile_insert_failed();
                warn!(
                    error = %e,
                    fid = fid,
                    user_id = %user.id,
                    drift = "auth_user_without_profile",
                    "Failed to insert profile for new auth user"
                );
                Ok(Reconciled::Created(user))
            }
        }
    }

    /// Another writer owns this FID: return its account instead of creating one.
    async fn adopt_existing(&self, fid: i64) -> Result<Reconciled, ReconcileError> {
        match self.store.find_profile_by_fid(fid).await {
            Ok(Some(profile)) => self.linked_user(&profile).await.map(Reconciled::Existing),
            Ok(None) => {
                error!(
                    fid = fid,
                    drift = "auth_user_without_profile",
                    "Auth user for FID already exists but has no profile"
                );
                Err(ReconcileError::Creation(format!(
                    "auth user for fid {} exists without a profile",
                    fid
                )))
            }
            Err(e) => {
                error!(error = %e, fid = fid, "Database error re-fetching Farcaster profile");
                Err(ReconcileError::Lookup(e))
            }
        }
    }
}
