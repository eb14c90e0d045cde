// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for sealing OAuth tokens at rest.
//!
//! Uses direct KMS encryption (not envelope encryption). The subject ID is
//! bound to every ciphertext as additional authenticated data, so a token
//! copied onto another user's document fails to decrypt.

use crate::error::PersistError;
use crate::models::{Credential, StoredCredential};
use crate::time_utils::format_utc_rfc3339;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "hive-social";

    /// Create a new KMS service connected to GCP KMS.
    pub async fn new(
        project_id: &str,
        location: &str,
        key_name: &str,
    ) -> Result<Self, PersistError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                PersistError::Unavailable(format!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| PersistError::Unavailable(format!("Failed to create KMS client: {}", e)))?;

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service (base64 pass-through).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext bound to `aad`. Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, PersistError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(BASE64.encode(plaintext));
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PersistError::Unavailable("KMS client not connected".to_string()))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| PersistError::Unavailable(format!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext that was bound to `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, PersistError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| PersistError::Unavailable(format!("Base64 decode failed: {}", e)))?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return String::from_utf8(ciphertext).map_err(|e| {
                    PersistError::Unavailable(format!("UTF-8 decode failed (mock): {}", e))
                });
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PersistError::Unavailable("KMS client not connected".to_string()))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| PersistError::Unavailable(format!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| PersistError::Unavailable(format!("UTF-8 decode failed: {}", e)))
    }

    /// Seal a credential for storage under `subject_id`.
    pub async fn seal(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<StoredCredential, PersistError> {
        let aad = subject_id.as_bytes();
        let access_token_encrypted = self.encrypt(&credential.access_token, aad).await?;
        let refresh_token_encrypted = match &credential.refresh_token {
            Some(token) => Some(self.encrypt(token, aad).await?),
            None => None,
        };

        Ok(StoredCredential {
            access_token_encrypted,
            refresh_token_encrypted,
            expires_at: credential.expires_at.map(format_utc_rfc3339),
            scopes: credential.granted_scopes.iter().cloned().collect(),
            updated_at: format_utc_rfc3339(Utc::now()),
        })
    }

    /// Reverse of [`KmsService::seal`].
    pub async fn unseal(
        &self,
        subject_id: &str,
        stored: &StoredCredential,
    ) -> Result<Credential, PersistError> {
        let aad = subject_id.as_bytes();
        let access_token = self.decrypt(&stored.access_token_encrypted, aad).await?;
        let refresh_token = match &stored.refresh_token_encrypted {
            Some(token) => Some(self.decrypt(token, aad).await?),
            None => None,
        };
        let expires_at = match &stored.expires_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| {
                        PersistError::Unavailable(format!("Failed to parse expiry: {}", e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(Credential {
            access_token,
            refresh_token,
            expires_at,
            granted_scopes: stored.scopes.iter().cloned().collect(),
        })
    }
}
