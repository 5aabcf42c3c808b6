// src/services/sqlite_store.rs
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::models::{AuthUser, NewAuthUser, UserProfile};
use crate::common::safe_email_log;
use crate::services::identity_store::{IdentityStore, ProfileInsert, StoreError};

/// Local identity store backed by the `auth_users` and `profiles` tables.
/// Used for development when no hosted provider is configured.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    db: SqlitePool,
}

#[derive(FromRow)]
struct AuthUserRow {
    id: String,
    email: String,
    user_metadata: String,
}

impl TryFrom<AuthUserRow> for AuthUser {
    type Error = StoreError;

    fn try_from(row: AuthUserRow) -> Result<Self, Self::Error> {
        let user_metadata = serde_json::from_str(&row.user_metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(AuthUser {
            id: row.id,
            email: row.email,
            user_metadata,
        })
    }
}

impl SqliteIdentityStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_profile_by_fid(&self, fid: i64) -> Result<Option<UserProfile>, StoreError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, fid, username FROM profiles WHERE fid = ?",
        )
        .bind(fid)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn create_auth_user(&self, new_user: &NewAuthUser) -> Result<AuthUser, StoreError> {
        let id = Uuid::new_v4().to_string();
        let metadata = serde_json::to_value(&new_user.user_metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query("INSERT INTO auth_users (id, email, user_metadata) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&new_user.email)
            .bind(metadata.to_string())
            .execute(&self.db)
            .await;

        match result {
            Ok(_) => {
                info!(
                    user_id = %id,
                    email = %safe_email_log(&new_user.email),
                    "Created local auth user"
                );
                Ok(AuthUser {
                    id,
                    email: new_user.email.clone(),
                    user_metadata: metadata,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(email = %safe_email_log(&new_user.email), "Auth user email already registered");
                Err(StoreError::Conflict)
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn get_auth_user(&self, id: &str) -> Result<Option<AuthUser>, StoreError> {
        let row = sqlx::query_as::<_, AuthUserRow>(
            "SELECT id, email, user_metadata FROM auth_users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(AuthUser::try_from).transpose()
    }

    async fn insert_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<ProfileInsert, StoreError> {
        let result = sqlx::query(
            "INSERT INTO profiles (id, fid, username) VALUES (?, ?, ?) ON CONFLICT(fid) DO NOTHING",
        )
        .bind(&profile.id)
        .bind(profile.fid)
        .bind(&profile.username)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 1 {
            Ok(ProfileInsert::Inserted(profile.clone()))
        } else {
            Ok(ProfileInsert::AlreadyExists)
        }
    }

    async fn delete_auth_user(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
