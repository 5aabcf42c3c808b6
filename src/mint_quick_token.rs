// mint_quick_token.rs
// Utility to sign a Quick Auth token for local testing of the login endpoint
//
// Usage: mint_quick_token <fid> [username] [ttl-minutes]

use chrono::{Duration, Utc};
use dotenv::dotenv;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();

    let Some(fid) = args.first().and_then(|a| a.parse::<i64>().ok()).filter(|f| *f > 0) else {
        eprintln!("Usage: mint_quick_token <fid> [username] [ttl-minutes]");
        return ExitCode::FAILURE;
    };
    let username = args.get(1).filter(|u| !u.is_empty());
    let ttl_minutes = args
        .get(2)
        .and_then(|m| m.parse::<i64>().ok())
        .unwrap_or(60);

    let secret = match env::var("FARCASTER_JWT_SECRET") {
        Ok(s) if !s.trim().is_empty() => s,
        _ => {
            eprintln!("FARCASTER_JWT_SECRET must be set (environment or .env)");
            return ExitCode::FAILURE;
        }
    };

    let now = Utc::now();
    let mut claims = json!({
        "fid": fid,
        "iat": now.timestamp(),
        "exp": (now + Duration::minutes(ttl_minutes)).timestamp(),
    });
    if let Some(name) = username {
        claims["username"] = json!(name);
    }
    if let Ok(aud) = env::var("FARCASTER_QUICK_AUTH_AUDIENCE") {
        if !aud.trim().is_empty() {
            claims["aud"] = json!(aud.trim());
        }
    }

    match encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.trim().as_bytes()),
    ) {
        Ok(token) => {
            println!("{}", token);
            eprintln!();
            eprintln!("Try it:");
            eprintln!(
                "  curl -X POST localhost:8080/api/auth/farcaster -H 'content-type: application/json' \\"
            );
            eprintln!("    -d '{{\"type\":\"quick\",\"token\":\"{}\"}}'", token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to sign token: {}", e);
            ExitCode::FAILURE
        }
    }
}
