// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use hive_social::config::Config;
use hive_social::db::MemoryDb;
use hive_social::routes::create_router;
use hive_social::services::GoogleEndpoints;
use hive_social::AppState;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERINFO_EMAIL: &str = "https://www.googleapis.com/auth/userinfo.email";
pub const USERINFO_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";
#[allow(dead_code)]
pub const BIRTHDAY: &str = "https://www.googleapis.com/auth/user.birthday.read";
#[allow(dead_code)]
pub const CONTACTS_READONLY: &str = "https://www.googleapis.com/auth/contacts.readonly";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Build app state over an in-memory store, with Google pointed at `server`.
/// Returns the state and a handle on the store.
#[allow(dead_code)]
pub fn test_state(server: &MockServer) -> (Arc<AppState>, MemoryDb) {
    let db = MemoryDb::new();
    let state = AppState::new(
        Config::test_default(),
        db.clone(),
        GoogleEndpoints::with_base(&server.uri()),
    )
    .expect("Failed to build app state");
    (Arc::new(state), db)
}

/// Create a test app backed by the mock server and an in-memory store.
#[allow(dead_code)]
pub fn create_test_app(server: &MockServer) -> (axum::Router, Arc<AppState>, MemoryDb) {
    let (state, db) = test_state(server);
    (create_router(state.clone()), state, db)
}

/// Space-joined scope string including the identity scopes.
#[allow(dead_code)]
pub fn granted(extra: &[&str]) -> String {
    let mut scopes = vec![USERINFO_EMAIL, USERINFO_PROFILE];
    scopes.extend_from_slice(extra);
    scopes.join(" ")
}

/// Token endpoint answers `code` with AT1/RT1 and the given scope string.
#[allow(dead_code)]
pub async fn mount_code_exchange(server: &MockServer, code: &str, scope: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(&format!("code={}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "expires_in": 3599,
            "scope": scope,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

/// userinfo returns subject `u1` / `a@b.com`.
#[allow(dead_code)]
pub async fn mount_userinfo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth2/v1/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "a@b.com",
            "name": "Ann Example",
            "picture": "https://lh3.googleusercontent.com/a/photo"
        })))
        .mount(server)
        .await;
}

/// `n` distinct contacts with emails `c0@example.com` ...
#[allow(dead_code)]
pub fn connections_body(n: usize) -> serde_json::Value {
    let connections: Vec<_> = (0..n)
        .map(|i| {
            serde_json::json!({
                "resourceName": format!("people/c{}", i),
                "names": [{"displayName": format!("Contact {}", i)}],
                "emailAddresses": [{"value": format!("c{}@example.com", i)}]
            })
        })
        .collect();
    serde_json::json!({ "connections": connections })
}
