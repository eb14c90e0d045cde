// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A renewable OAuth credential for one subject.
///
/// The subject ID is not part of the credential: it is only known once the
/// identity has been fetched, and stores key credentials by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    /// Google only returns a refresh token on first consent (or with
    /// `prompt=consent`), so this is often absent on later grants.
    pub refresh_token: Option<String>,
    /// When the access token expires, if the provider told us.
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes the provider actually granted (may be fewer than requested).
    pub granted_scopes: BTreeSet<String>,
}

impl Credential {
    /// Whether the access token should be treated as expired `margin` from now.
    ///
    /// A credential with unknown expiry is never considered expired; the
    /// provider's 401 is the only signal in that case.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at
            .map(|expires_at| now + margin >= expires_at)
            .unwrap_or(false)
    }

    /// Merge an incoming credential over the stored one.
    ///
    /// Everything is replaced except the refresh token, which is kept when the
    /// incoming credential has none.
    pub fn merged_over(self, previous: Option<&Credential>) -> Credential {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));
        Credential {
            refresh_token,
            ..self
        }
    }
}

/// Credential as stored in Firestore, with tokens sealed by KMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: Option<String>,
    /// When the access token expires (RFC 3339)
    pub expires_at: Option<String>,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(access: &str, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: refresh.map(String::from),
            expires_at: None,
            granted_scopes: BTreeSet::new(),
        }
    }

    #[test]
    fn test_merge_keeps_previous_refresh_token() {
        let previous = credential("AT1", Some("RT1"));
        let merged = credential("AT2", None).merged_over(Some(&previous));

        assert_eq!(merged.access_token, "AT2");
        assert_eq!(merged.refresh_token.as_deref(), Some("RT1"));
    }

    #[test]
    fn test_merge_prefers_new_refresh_token() {
        let previous = credential("AT1", Some("RT1"));
        let merged = credential("AT2", Some("RT2")).merged_over(Some(&previous));

        assert_eq!(merged.refresh_token.as_deref(), Some("RT2"));
    }

    #[test]
    fn test_merge_without_previous() {
        let merged = credential("AT1", None).merged_over(None);
        assert_eq!(merged.refresh_token, None);
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let margin = Duration::minutes(5);

        let mut cred = credential("AT", None);
        assert!(!cred.expires_within(now, margin), "unknown expiry is not expired");

        cred.expires_at = Some(now + Duration::minutes(2));
        assert!(cred.expires_within(now, margin));

        cred.expires_at = Some(now + Duration::hours(1));
        assert!(!cred.expires_within(now, margin));
    }
}
