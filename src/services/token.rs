// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token exchanger: authorization-code and refresh-token grants.
//!
//! All talk to Google's token endpoint goes through here. Refreshed
//! credentials are written back through the [`CredentialStore`] before the new
//! access token is handed out.

use crate::db::CredentialStore;
use crate::error::{ExchangeError, RefreshError};
use crate::models::Credential;
use crate::services::google::{GoogleApiError, GoogleClient, TokenResponse};
use crate::services::scopes::{parse_scope_list, ScopeRegistry};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Per-subject refresh locks, shared across clones of the exchanger.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Turns authorization codes and refresh tokens into access tokens.
#[derive(Clone)]
pub struct TokenExchanger {
    client: GoogleClient,
    store: Arc<dyn CredentialStore>,
    /// Assumed grant when the token response omits `scope`.
    requested: ScopeRegistry,
    /// Serializes refreshes per subject within this process. Entries are
    /// removed when the last holder releases them.
    refresh_locks: RefreshLocks,
}

impl TokenExchanger {
    pub fn new(
        client: GoogleClient,
        store: Arc<dyn CredentialStore>,
        requested: ScopeRegistry,
    ) -> Self {
        Self {
            client,
            store,
            requested,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Authorization Code Grant ────────────────────────────────────────────

    /// Exchange an authorization code for a credential.
    ///
    /// The credential's scopes are the ones Google reports as granted, which
    /// can be fewer than requested.
    pub async fn exchange(&self, code: &str) -> Result<Credential, ExchangeError> {
        if code.trim().is_empty() {
            return Err(ExchangeError::InvalidGrant(
                "missing authorization code".to_string(),
            ));
        }

        let response = self.client.exchange_code(code).await.map_err(|e| {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            if e.is_transient() {
                ExchangeError::Transient(e.to_string())
            } else {
                ExchangeError::InvalidGrant(e.to_string())
            }
        })?;

        let fallback = self.requested_scope_set();
        let credential = credential_from_response(response, Utc::now(), &fallback);

        tracing::info!(
            granted_scopes = credential.granted_scopes.len(),
            has_refresh_token = credential.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(credential)
    }

    // ─── Refresh Token Grant ─────────────────────────────────────────────────

    /// Refresh the access token of `subject_id` unconditionally.
    ///
    /// Fails fast with `NoRefreshToken` when nothing usable is stored. On
    /// `Revoked` the stored credential is left untouched.
    pub async fn refresh(&self, subject_id: &str) -> Result<String, RefreshError> {
        let result = {
            let lock = self.lock_for(subject_id);
            let _guard = lock.lock().await;

            match self.store.get_credential(subject_id).await {
                Ok(Some(stored)) => self.refresh_stored(subject_id, stored).await,
                Ok(None) => Err(RefreshError::NoRefreshToken),
                Err(e) => Err(e.into()),
            }
        };
        self.release_lock(subject_id);

        Ok(result?.access_token)
    }

    /// Return an access token that is not about to expire, refreshing first
    /// when needed.
    pub async fn valid_access_token(&self, subject_id: &str) -> Result<String, RefreshError> {
        Ok(self.valid_credential(subject_id).await?.access_token)
    }

    /// Like [`Self::valid_access_token`], but returns the whole credential.
    ///
    /// Concurrent callers for the same subject wait on one refresh instead of
    /// each spending the refresh token.
    pub async fn valid_credential(&self, subject_id: &str) -> Result<Credential, RefreshError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let stored = self
            .store
            .get_credential(subject_id)
            .await?
            .ok_or(RefreshError::NoRefreshToken)?;
        if !stored.expires_within(Utc::now(), margin) {
            return Ok(stored);
        }

        let result = {
            let lock = self.lock_for(subject_id);
            let _guard = lock.lock().await;
            self.refresh_if_expiring(subject_id, margin).await
        };
        self.release_lock(subject_id);
        result
    }

    /// Caller must hold the subject's refresh lock.
    async fn refresh_if_expiring(
        &self,
        subject_id: &str,
        margin: Duration,
    ) -> Result<Credential, RefreshError> {
        // Another task may have refreshed while we were waiting.
        let stored = self
            .store
            .get_credential(subject_id)
            .await?
            .ok_or(RefreshError::NoRefreshToken)?;
        if !stored.expires_within(Utc::now(), margin) {
            return Ok(stored);
        }

        tracing::info!(subject_id, "Access token expiring, refreshing");
        self.refresh_stored(subject_id, stored).await
    }

    /// Caller must hold the subject's refresh lock.
    async fn refresh_stored(
        &self,
        subject_id: &str,
        stored: Credential,
    ) -> Result<Credential, RefreshError> {
        let refresh_token = stored
            .refresh_token
            .clone()
            .ok_or(RefreshError::NoRefreshToken)?;

        let response = match self.client.refresh_token(&refresh_token).await {
            Ok(response) => response,
            Err(GoogleApiError::InvalidGrant(msg)) => {
                tracing::warn!(subject_id, reason = %msg, "Refresh token revoked");
                return Err(RefreshError::Revoked(msg));
            }
            Err(e) => {
                tracing::warn!(subject_id, error = %e, "Token refresh failed");
                return Err(RefreshError::Transient(e.to_string()));
            }
        };

        let renewed = credential_from_response(response, Utc::now(), &stored.granted_scopes)
            .merged_over(Some(&stored));

        self.store.put_credential(subject_id, renewed.clone()).await?;

        tracing::info!(subject_id, "Token refreshed and stored");
        Ok(renewed)
    }

    fn lock_for(&self, subject_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the subject's lock once nobody else holds or waits on it, so the
    /// map only ever holds subjects with a refresh in flight.
    fn release_lock(&self, subject_id: &str) {
        self.refresh_locks
            .remove_if(subject_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn requested_scope_set(&self) -> BTreeSet<String> {
        self.requested
            .requested_scopes()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Build a credential from a token response.
///
/// `fallback_scopes` is used when the response does not echo a `scope`.
fn credential_from_response(
    response: TokenResponse,
    now: DateTime<Utc>,
    fallback_scopes: &BTreeSet<String>,
) -> Credential {
    let granted_scopes = response
        .scope
        .as_deref()
        .map(parse_scope_list)
        .unwrap_or_else(|| fallback_scopes.clone());

    Credential {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: response.expires_in.and_then(|secs| expiry_after(now, secs)),
        granted_scopes,
    }
}

/// `now + secs`, or `None` when `secs` is out of chrono's range.
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    let expiry = Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d));
    if expiry.is_none() {
        tracing::warn!(expires_in = secs, "Ignoring out-of-range expires_in");
    }
    expiry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(scope: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
        TokenResponse {
            access_token: "AT1".to_string(),
            refresh_token: None,
            expires_in,
            scope: scope.map(String::from),
        }
    }

    #[test]
    fn test_credential_uses_echoed_scopes() {
        let fallback = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let credential = credential_from_response(response(Some("b"), None), Utc::now(), &fallback);
        assert_eq!(credential.granted_scopes, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn test_credential_falls_back_to_requested_scopes() {
        let fallback = BTreeSet::from(["a".to_string()]);
        let credential = credential_from_response(response(None, None), Utc::now(), &fallback);
        assert_eq!(credential.granted_scopes, fallback);
        assert_eq!(credential.expires_at, None);
    }

    #[test]
    fn test_credential_expiry_from_expires_in() {
        let now = Utc::now();
        let credential =
            credential_from_response(response(None, Some(3600)), now, &BTreeSet::new());
        assert_eq!(credential.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[tokio::test]
    async fn test_refresh_lock_released_after_refresh() {
        use crate::db::MemoryDb;
        use crate::services::GoogleEndpoints;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT2",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let client = GoogleClient::new(
            "client".to_string(),
            "secret".to_string(),
            "http://localhost/callback".to_string(),
            GoogleEndpoints::with_base(&server.uri()),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let db = MemoryDb::new();
        let exchanger = TokenExchanger::new(client, Arc::new(db.clone()), ScopeRegistry::google());

        db.put_credential(
            "u1",
            Credential {
                access_token: "AT1".to_string(),
                refresh_token: Some("RT1".to_string()),
                expires_at: Some(Utc::now() - Duration::minutes(1)),
                granted_scopes: BTreeSet::new(),
            },
        )
        .await
        .unwrap();

        assert_eq!(exchanger.valid_access_token("u1").await.unwrap(), "AT2");
        assert!(exchanger.refresh_locks.is_empty());

        assert_eq!(exchanger.refresh("u1").await.unwrap(), "AT2");
        assert_eq!(exchanger.refresh("nobody").await, Err(RefreshError::NoRefreshToken));
        assert!(exchanger.refresh_locks.is_empty());
    }

    #[test]
    fn test_out_of_range_expires_in_is_unknown_expiry() {
        let now = Utc::now();
        for secs in [i64::MAX, i64::MIN, 1_000_000_000_000_000] {
            let credential =
                credential_from_response(response(None, Some(secs)), now, &BTreeSet::new());
            assert_eq!(credential.expires_at, None, "expires_in = {secs}");
            assert_eq!(credential.access_token, "AT1");
        }
    }
}
