// src/services/supabase.rs
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::auth::models::{AuthUser, NewAuthUser, UserProfile};
use crate::common::safe_email_log;
use crate::services::identity_store::{IdentityStore, ProfileInsert, StoreError};

/// PostgREST code for "JSON object requested, multiple (or no) rows returned"
const PGRST_NO_ROWS: &str = "PGRST116";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const PROFILES_TABLE: &str = "profiles";

/// Identity store backed by Supabase: PostgREST for `profiles`, the GoTrue
/// admin API for auth users. Every call runs with the service role key.
pub struct SupabaseStore {
    http: Client,
    base_url: String,
    service_key: String,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct GoTrueError {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl GoTrueError {
    fn text(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
            .unwrap_or_default()
    }
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn admin_users_url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!(
                "{}/auth/v1/admin/users/{}",
                self.base_url,
                urlencoding::encode(id)
            ),
            None => format!("{}/auth/v1/admin/users", self.base_url),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Maps a failed PostgREST single-object read. `Ok(())` means "no row".
fn classify_postgrest_error(status: StatusCode, body: &str) -> Result<(), StoreError> {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    if parsed.code.as_deref() == Some(PGRST_NO_ROWS) {
        return Ok(());
    }
    Err(StoreError::Provider {
        status: status.as_u16(),
        message: parsed
            .message
            .or(parsed.code)
            .unwrap_or_else(|| body.to_string()),
    })
}

/// Maps a failed GoTrue admin call, recognising duplicate-email responses.
fn classify_gotrue_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: GoTrueError = serde_json::from_str(body).unwrap_or_default();
    let text = parsed.text();

    let duplicate = parsed.error_code.as_deref() == Some("email_exists")
        || text.contains("already been registered");
    if duplicate && (status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::CONFLICT)
    {
        return StoreError::Conflict;
    }

    StoreError::Provider {
        status: status.as_u16(),
        message: if text.is_empty() { body.to_string() } else { text },
    }
}

/// With `resolution=ignore-duplicates` PostgREST answers an ignored row with
/// an empty representation.
fn profile_insert_outcome(rows: Vec<UserProfile>) -> ProfileInsert {
    match rows.into_iter().next() {
        Some(row) => ProfileInsert::Inserted(row),
        None => ProfileInsert::AlreadyExists,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl IdentityStore for SupabaseStore {
    async fn find_profile_by_fid(&self, fid: i64) -> Result<Option<UserProfile>, StoreError> {
        let response = self
            .authorized(self.http.get(self.rest_url(PROFILES_TABLE)))
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&[
                ("select", "id,fid,username".to_string()),
                ("fid", format!("eq.{}", fid)),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(fid = fid, "Found profile for FID");
            return read_json(response).await.map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        classify_postgrest_error(status, &body)?;
        debug!(fid = fid, "No profile for FID");
        Ok(None)
    }

    async fn create_auth_user(&self, new_user: &NewAuthUser) -> Result<AuthUser, StoreError> {
        let response = self
            .authorized(self.http.post(self.admin_users_url(None)))
            .json(new_user)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let user: AuthUser = read_json(response).await?;
            info!(
                user_id = %user.id,
                email = %safe_email_log(&user.email),
                "Created auth user via admin API"
            );
            return Ok(user);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_gotrue_error(status, &body);
        if !matches!(err, StoreError::Conflict) {
            error!(http_status = %status, error = %err, "Admin API rejected user creation");
        }
        Err(err)
    }

    async fn get_auth_user(&self, id: &str) -> Result<Option<AuthUser>, StoreError> {
        let response = self
            .authorized(self.http.get(self.admin_users_url(Some(id))))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_success() {
            return read_json(response).await.map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_gotrue_error(status, &body))
    }

    async fn insert_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<ProfileInsert, StoreError> {
        let response = self
            .authorized(self.http.post(self.rest_url(PROFILES_TABLE)))
            .query(&[("on_conflict", "fid")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&[profile])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();
            return Err(StoreError::Provider {
                status: status.as_u16(),
                message: parsed.message.unwrap_or(body),
            });
        }

        let rows: Vec<UserProfile> = read_json(response).await?;
        let outcome = profile_insert_outcome(rows);
        if outcome == ProfileInsert::AlreadyExists {
            debug!(fid = profile.fid, "Profile insert skipped, FID already registered");
        }
        Ok(outcome)
    }

    async fn delete_auth_user(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .authorized(self.http.delete(self.admin_users_url(Some(id))))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_gotrue_error(status, &body);
        warn!(user_id = %id, error = %err, "Admin API rejected user deletion");
        Err(err)
    }
}
