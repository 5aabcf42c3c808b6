// src/main.rs
use axum::{extract::Extension, middleware, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod logging_middleware;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::{AppState, AuthConfig, StoreBackend};
use services::{Eip191Verifier, IdentityStore, SqliteIdentityStore, SupabaseStore};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer())
        .init();

    // ========================================================================
    // ERROR TRACKING
    // ========================================================================

    let _sentry_guard = env::var("SENTRY_DSN")
        .ok()
        .filter(|dsn| !dsn.trim().is_empty())
        .map(|dsn| {
            let guard = sentry::init((
                dsn.as_str(),
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    environment: Some(
                        env::var("ENVIRONMENT")
                            .unwrap_or_else(|_| "development".to_string())
                            .into(),
                    ),
                    ..Default::default()
                },
            ));
            info!("Sentry initialized successfully");
            guard
        });

    // ========================================================================
    // METRICS
    // ========================================================================

    let metrics_handle = auth::metrics::install_recorder()?;
    info!("Prometheus recorder installed");

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AuthConfig::from_env();
    let missing = config.missing_required();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "Farcaster login will answer 500 until these settings are provided"
        );
    }
    info!(
        email_domain = %config.email_domain,
        session_ttl_hours = config.session_ttl_hours,
        siwf_domain = ?config.siwf_domain,
        quick_auth_audience = ?config.quick_auth_audience,
        "Loaded auth configuration"
    );

    // ========================================================================
    // IDENTITY STORE SETUP
    // ========================================================================

    let identity_store: Option<Arc<dyn IdentityStore>> = match StoreBackend::from_env() {
        StoreBackend::Supabase { url, timeout } => match config.service_role_key.as_deref() {
            Some(key) => {
                let store = SupabaseStore::new(&url, key, timeout)?;
                info!(url = %url, "SupabaseStore initialized");
                Some(Arc::new(store))
            }
            None => {
                warn!("SUPABASE_URL set without SUPABASE_SERVICE_ROLE_KEY; identity store disabled");
                None
            }
        },
        StoreBackend::Sqlite { database_url } => {
            if let Some(path_part) = database_url.strip_prefix("sqlite://") {
                let path_without_params = path_part.split('?').next().unwrap_or("");
                if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
                    let db_path = PathBuf::from(path_without_params);
                    if let Some(parent) = db_path.parent() {
                        if !parent.as_os_str().is_empty() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                    }
                }
            }

            let connect_options =
                SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .connect_with(connect_options)
                .await?;

            common::migrations::run_migrations(&pool).await?;
            info!(database_url = %database_url, "SqliteIdentityStore initialized");
            Some(Arc::new(SqliteIdentityStore::new(pool)))
        }
    };

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        identity_store,
        signature_verifier: Arc::new(Eip191Verifier),
        config,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .merge(auth::auth_routes())
        .merge(auth::metrics::metrics_routes(metrics_handle))
        // Add request/response body logging in debug mode
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(shared))
        .layer({
            let cors_origins = env::var("CORS_ORIGINS").unwrap_or_else(|_| {
                "http://localhost:3000,http://localhost:3001,http://localhost:5173".to_string()
            });

            let origins: Vec<axum::http::HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                    axum::http::HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
