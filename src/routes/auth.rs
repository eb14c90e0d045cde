// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays valid (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/logout", get(logout).post(logout))
}

/// Start OAuth flow - redirect to Google's consent screen.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let frontend_url = state.config.frontend_url.clone();

    let oauth_state = sign_state(&frontend_url, now_millis()?, &state.config.oauth_state_key)?;
    let scopes = state.registry.requested_scopes();
    let auth_url = state.google.authorization_url(&scopes, &oauth_state);

    tracing::info!(
        scopes = scopes.len(),
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code, aggregate and store the profile, start a
/// session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    // Only callbacks for a flow we started are honored
    let now = now_millis()?;
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key, now))
        .ok_or_else(|| {
            tracing::warn!("Rejecting callback with missing, tampered or expired state");
            AppError::BadRequest("Invalid or expired state.".to_string())
        })?;

    // User declined consent or Google reported a problem
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("No code provided.".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let identity = state.sync.complete_authorization(&code).await?;

    let jwt = create_jwt(&identity.subject_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(subject_id = %identity.subject_id, "OAuth successful, session created");

    let jar = jar.add(session_cookie(jwt, &frontend_url));
    Ok((jar, Redirect::temporary(&format!("{}/dashboard", frontend_url))))
}

/// End the session by expiring its cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let mut removal = session_cookie(String::new(), &state.config.frontend_url);
    removal.make_removal();
    (jar.add(removal), Redirect::to(&state.config.frontend_url))
}

fn session_cookie(value: String, frontend_url: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(frontend_url.starts_with("https://"))
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Sign `frontend_url|timestamp_hex` and pack it for the `state` parameter.
fn sign_state(frontend_url: &str, timestamp: u128, secret: &[u8]) -> Result<String> {
    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and age, and decode the frontend URL from the OAuth
/// state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex". Split from the
    // right so a '|' inside the URL survives.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if !bool::from(signature_hex.as_bytes().ct_eq(expected_signature.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if issued_ms > now_ms || now_ms - issued_ms > STATE_MAX_AGE_MS {
        tracing::warn!(age_ms = now_ms.saturating_sub(issued_ms), "OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUED_MS: u128 = 1_700_000_000_000;

    #[test]
    fn test_sign_then_verify_state() {
        let secret = b"secret_key";
        let encoded = sign_state("https://example.com", ISSUED_MS, secret).unwrap();
        assert_eq!(
            verify_and_decode_state(&encoded, secret, ISSUED_MS + 1_000),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_verify_and_decode_state_rejects_stale_state() {
        let secret = b"secret_key";
        let encoded = sign_state("https://example.com", ISSUED_MS, secret).unwrap();

        assert!(verify_and_decode_state(&encoded, secret, ISSUED_MS + STATE_MAX_AGE_MS).is_some());
        assert_eq!(
            verify_and_decode_state(&encoded, secret, ISSUED_MS + STATE_MAX_AGE_MS + 1),
            None
        );
        // Issued in the future
        assert_eq!(verify_and_decode_state(&encoded, secret, ISSUED_MS - 1), None);
    }

    #[test]
    fn test_verify_and_decode_state_invalid_signature() {
        let secret = b"secret_key";
        let state_data = format!("{}|{:x}|{}", "https://example.com", ISSUED_MS, "bad");
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        assert_eq!(verify_and_decode_state(&encoded_state, secret, ISSUED_MS), None);
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let encoded = sign_state("https://example.com", ISSUED_MS, b"secret_key").unwrap();
        assert_eq!(verify_and_decode_state(&encoded, b"wrong_key", ISSUED_MS), None);
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        let secret = b"secret_key";
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_and_decode_state(&encoded_state, secret, ISSUED_MS), None);
        assert_eq!(verify_and_decode_state("not base64!", secret, ISSUED_MS), None);
    }

    #[test]
    fn test_session_cookie_secure_only_over_https() {
        let local = session_cookie("t".to_string(), "http://localhost:5173");
        assert_eq!(local.secure(), Some(false));
        assert_eq!(local.http_only(), Some(true));

        let prod = session_cookie("t".to_string(), "https://hive.example.com");
        assert_eq!(prod.secure(), Some(true));
        assert_eq!(prod.path(), Some("/"));
    }
}
