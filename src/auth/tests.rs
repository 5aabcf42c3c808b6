//! Tests for auth module
//!
//! These tests drive the Farcaster login endpoint end to end against an
//! in-memory SQLite identity store:
//! - request body validation and error ordering
//! - Quick Auth and SIWF verification
//! - first sight vs. returning users
//! - session token introspection

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::{migrations, AppState, AuthConfig};
    use crate::services::signature::{
        address_from_key, eip191_hash, Eip191Verifier, SignatureError, SignatureVerifier,
    };
    use crate::services::sqlite_store::SqliteIdentityStore;
    use axum::{
        body::to_bytes,
        extract::{Extension, FromRequestParts},
        http::{header::AUTHORIZATION, Request, StatusCode},
        response::IntoResponse,
        Json,
    };
    use bytes::Bytes;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use k256::ecdsa::SigningKey;
    use serde_json::{json, Value};
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    const FARCASTER_SECRET: &str = "farcaster-test-secret";

    struct RejectingVerifier;

    impl SignatureVerifier for RejectingVerifier {
        fn verify(&self, _: &str, _: &str, _: &str) -> Result<bool, SignatureError> {
            Ok(false)
        }
    }

    fn full_config() -> AuthConfig {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FARCASTER_JWT_SECRET", FARCASTER_SECRET),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-role-key"),
        ]);
        AuthConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    fn empty_config() -> AuthConfig {
        AuthConfig::from_lookup(|_| None)
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        migrations::migrate(&pool, false)
            .await
            .expect("Failed to run migrations");
        pool
    }

    async fn test_state(
        config: AuthConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> (Arc<RwLock<AppState>>, SqlitePool) {
        let pool = test_pool().await;
        let state = AppState {
            identity_store: Some(Arc::new(SqliteIdentityStore::new(pool.clone()))),
            signature_verifier: verifier,
            config,
        };
        (Arc::new(RwLock::new(state)), pool)
    }

    fn quick_token(claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(FARCASTER_SECRET.as_bytes()),
        )
        .expect("Failed to encode token")
    }

    fn future_exp() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    async fn call(state: &Arc<RwLock<AppState>>, body: Value) -> (StatusCode, Value) {
        call_raw(state, Bytes::from(body.to_string())).await
    }

    async fn call_raw(state: &Arc<RwLock<AppState>>, body: Bytes) -> (StatusCode, Value) {
        let response = handlers::farcaster_auth(Extension(state.clone()), body)
            .await
            .into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn auth_user_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM auth_users")
            .fetch_one(pool)
            .await
            .expect("Failed to count users")
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        let (sig, recovery_id) = key
            .sign_prehash_recoverable(&eip191_hash(message))
            .expect("signing failed");
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    fn siwf_message(address: &str, fid: i64) -> String {
        format!(
            "ephemnotes.app wants you to sign in with your Ethereum account:\n\
             {address}\n\n\
             Farcaster Auth\n\n\
             URI: https://ephemnotes.app/login\n\
             Version: 1\n\
             Chain ID: 10\n\
             Nonce: abcdef123456\n\
             Issued At: {}\n\
             Resources:\n\
             - farcaster://fid/{fid}",
            Utc::now().to_rfc3339()
        )
    }

    #[tokio::test]
    async fn test_quick_auth_creates_user() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 12345, "username": "testuser", "exp": future_exp() }));

        let (status, body) = call(&state, json!({ "type": "quick", "token": token })).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["user_metadata"]["fid"], 12345);
        assert_eq!(body["user"]["user_metadata"]["username"], "testuser");
        assert_eq!(body["user"]["email"], "fid-12345@farcaster.ephemnotes.app");
        assert_eq!(
            body["access_token"].as_str().unwrap().split('.').count(),
            3
        );
        assert_eq!(auth_user_count(&pool).await, 1);

        let profile: (String, i64, String) =
            sqlx::query_as("SELECT id, fid, username FROM profiles WHERE fid = ?")
                .bind(12345_i64)
                .fetch_one(&pool)
                .await
                .expect("profile row should exist");
        assert_eq!(profile.0, body["user"]["id"].as_str().unwrap());
        assert_eq!(profile.2, "testuser");
    }

    #[tokio::test]
    async fn test_quick_auth_is_idempotent_per_fid() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 12345, "username": "testuser", "exp": future_exp() }));
        let request = json!({ "type": "quick", "token": token });

        let (first_status, first) = call(&state, request.clone()).await;
        let (second_status, second) = call(&state, request).await;

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first["user"]["id"], second["user"]["id"]);
        assert_eq!(auth_user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_session_token_is_valid_for_returned_user() {
        let (state, _pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 77, "exp": future_exp() }));

        let (_, body) = call(&state, json!({ "type": "quick", "token": token })).await;

        let claims =
            session::validate_session(body["access_token"].as_str().unwrap(), FARCASTER_SECRET)
                .expect("session token should validate");
        assert_eq!(claims.sub, body["user"]["id"].as_str().unwrap());
        assert_eq!(claims.fid, 77);
        assert_eq!(claims.aud, "authenticated");
        assert_eq!(claims.role, "authenticated");
    }

    #[tokio::test]
    async fn test_session_token_cannot_be_replayed_as_quick_token() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 12345, "exp": future_exp() }));
        let (status, body) = call(&state, json!({ "type": "quick", "token": token })).await;
        assert_eq!(status, StatusCode::CREATED);

        // Sessions are signed with FARCASTER_JWT_SECRET when no session secret is set
        let session = body["access_token"].as_str().unwrap();
        let (status, replay) = call(&state, json!({ "type": "quick", "token": session })).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(replay, json!({ "error": "Invalid token" }));
        assert_eq!(auth_user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_body_validation_precedes_config_check() {
        let (state, _pool) = test_state(empty_config(), Arc::new(Eip191Verifier)).await;

        let cases = [
            (Bytes::from_static(b"not json"), "Invalid request body"),
            (Bytes::from_static(b"[1, 2]"), "Invalid request body"),
            (
                Bytes::from(json!({ "type": "password" }).to_string()),
                "Invalid authentication type",
            ),
            (
                Bytes::from(json!({ "token": "abc" }).to_string()),
                "Invalid authentication type",
            ),
            (
                Bytes::from(json!({ "type": "quick" }).to_string()),
                "Missing token",
            ),
            (
                Bytes::from(json!({ "type": "siwf", "message": "hi" }).to_string()),
                "Missing message or signature",
            ),
        ];

        for (body, expected) in cases {
            let (status, json) = call_raw(&state, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json, json!({ "error": expected }));
        }
    }

    #[tokio::test]
    async fn test_missing_config_returns_500() {
        let (state, pool) = test_state(empty_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 12345, "exp": future_exp() }));

        let (status, body) = call(&state, json!({ "type": "quick", "token": token })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Server configuration error" }));
        assert_eq!(auth_user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_missing_store_returns_500() {
        let state = Arc::new(RwLock::new(AppState {
            identity_store: None,
            signature_verifier: Arc::new(Eip191Verifier),
            config: full_config(),
        }));
        let token = quick_token(json!({ "fid": 12345, "exp": future_exp() }));

        let (status, _) = call(&state, json!({ "type": "quick", "token": token })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_quick_token_creates_nothing() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;

        let (status, body) = call(&state, json!({ "type": "quick", "token": "invalid" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid token" }));

        let no_fid = quick_token(json!({ "username": "nobody", "exp": future_exp() }));
        let (status, _) = call(&state, json!({ "type": "quick", "token": no_fid })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(auth_user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_siwf_bad_signature_returns_401() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let message = siwf_message("0x1234567890abcdef1234567890abcdef12345678", 4321);

        let (status, body) = call(
            &state,
            json!({ "type": "siwf", "message": message, "signature": "0xbad" }),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid signature" }));
        assert_eq!(auth_user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_siwf_rejected_by_verifier_returns_401() {
        let (state, _pool) = test_state(full_config(), Arc::new(RejectingVerifier)).await;
        let message = siwf_message("0x1234567890abcdef1234567890abcdef12345678", 4321);

        let (status, _) = call(
            &state,
            json!({ "type": "siwf", "message": message, "signature": "0x00" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_siwf_without_address_returns_400() {
        let (state, _pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;

        let (status, body) = call(
            &state,
            json!({ "type": "siwf", "message": "no address in here", "signature": "0x00" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid SIWF message" }));
    }

    #[tokio::test]
    async fn test_signed_siwf_creates_then_finds_user() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let key = SigningKey::from_slice(&[7u8; 32]).expect("valid key");
        let address = address_from_key(key.verifying_key());
        let message = siwf_message(&address, 4321);
        let request = json!({ "type": "siwf", "message": message, "signature": sign(&key, &message) });

        let (status, body) = call(&state, request.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["user_metadata"]["fid"], 4321);
        assert_eq!(body["user"]["user_metadata"]["address"], address);
        assert_eq!(body["user"]["email"], "fid-4321@farcaster.ephemnotes.app");

        let (status, again) = call(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["user"]["id"], body["user"]["id"]);
        assert_eq!(auth_user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_siwf_and_quick_resolve_same_user() {
        let (state, pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let key = SigningKey::from_slice(&[9u8; 32]).expect("valid key");
        let message = siwf_message(&address_from_key(key.verifying_key()), 555);

        let (_, via_siwf) = call(
            &state,
            json!({ "type": "siwf", "message": message, "signature": sign(&key, &message) }),
        )
        .await;
        let token = quick_token(json!({ "fid": 555, "exp": future_exp() }));
        let (status, via_quick) = call(&state, json!({ "type": "quick", "token": token })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(via_siwf["user"]["id"], via_quick["user"]["id"]);
        assert_eq!(auth_user_count(&pool).await, 1);
    }

    fn request_parts(
        state: &Arc<RwLock<AppState>>,
        authorization: Option<&str>,
    ) -> axum::http::request::Parts {
        let mut builder = Request::builder().uri("/api/me").extension(state.clone());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).expect("valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_me_returns_session_identity() {
        let (state, _pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let token = quick_token(json!({ "fid": 12345, "username": "testuser", "exp": future_exp() }));
        let (_, body) = call(&state, json!({ "type": "quick", "token": token })).await;
        let access_token = body["access_token"].as_str().unwrap();

        let header = format!("Bearer {}", access_token);
        let mut parts = request_parts(&state, Some(&header));
        let authed = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .expect("session should authenticate");

        assert_eq!(authed.id, body["user"]["id"].as_str().unwrap());
        assert_eq!(authed.fid, 12345);
        assert_eq!(authed.username.as_deref(), Some("testuser"));

        let Json(me) = handlers::me_handler(authed).await.expect("me should succeed");
        assert_eq!(me["user"]["fid"], 12345);
        assert_eq!(me["user"]["email"], "fid-12345@farcaster.ephemnotes.app");
    }

    #[tokio::test]
    async fn test_extractor_rejects_missing_or_bad_token() {
        let (state, _pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;

        let mut parts = request_parts(&state, None);
        let err = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let mut parts = request_parts(&state, Some("Bearer not.a.token"));
        let err = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        // Quick Auth tokens are not sessions
        let quick = quick_token(json!({ "fid": 1, "exp": future_exp() }));
        let mut parts = request_parts(&state, Some(&quick));
        assert!(AuthedUser::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let (state, _pool) = test_state(full_config(), Arc::new(Eip191Verifier)).await;
        let Json(body) = handlers::health_handler(Extension(state)).await;
        assert_eq!(body, json!({ "status": "ok", "configured": true }));

        let (state, _pool) = test_state(empty_config(), Arc::new(Eip191Verifier)).await;
        let Json(body) = handlers::health_handler(Extension(state)).await;
        assert_eq!(body["configured"], false);
    }

    #[test]
    fn test_request_parsing() {
        use models::{FarcasterAuthRequest, RequestError};

        assert_eq!(
            FarcasterAuthRequest::parse(br#"{"type":"quick","token":"abc"}"#).unwrap(),
            FarcasterAuthRequest::Quick {
                token: "abc".to_string()
            }
        );
        assert_eq!(
            FarcasterAuthRequest::parse(br#"{"type":"siwf","message":"m","signature":"0x1"}"#)
                .unwrap()
                .mode(),
            "siwf"
        );
        assert_eq!(
            FarcasterAuthRequest::parse(br#"{"type":"quick","token":"   "}"#).unwrap_err(),
            RequestError::MissingToken
        );
        assert_eq!(
            FarcasterAuthRequest::parse(br#"{"type":"quick","token":42}"#).unwrap_err(),
            RequestError::MissingToken
        );
        assert_eq!(
            FarcasterAuthRequest::parse(br#""quick""#).unwrap_err(),
            RequestError::InvalidBody
        );
    }

    #[test]
    fn test_synthetic_identity_fields() {
        let identity = models::ExternalIdentity {
            fid: 42,
            username: None,
            address: None,
        };
        assert_eq!(identity.profile_username(), "fid-42");
        assert_eq!(
            models::synthetic_email(42, "ephemnotes.app"),
            "fid-42@farcaster.ephemnotes.app"
        );
    }
}
