// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (identity + profile facets)
//! - Credentials (OAuth tokens sealed with KMS)
//! - Contacts (keyed by dedup key)
//! - Content items (keyed by YouTube video ID)

use crate::db::{collections, CredentialStore, SnapshotStore};
use crate::error::PersistError;
use crate::models::{Contact, ContentItem, Credential, StoredCredential, UserRecord};
use crate::services::KmsService;
use async_trait::async_trait;

fn unavailable(e: impl std::fmt::Display) -> PersistError {
    PersistError::Unavailable(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    kms: KmsService,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, kms: KmsService) -> Result<Self, PersistError> {
        // The emulator takes an unauthenticated connection; skip local
        // credential discovery entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, kms).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| unavailable(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            kms,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(
        project_id: &str,
        kms: KmsService,
    ) -> Result<Self, PersistError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| unavailable(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            kms,
        })
    }

    /// Create a disconnected client. Every operation fails with
    /// `PersistError::Unavailable`.
    #[cfg(debug_assertions)]
    pub fn new_offline() -> Self {
        Self {
            client: None,
            kms: KmsService::new_mock(),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, PersistError> {
        self.client
            .as_ref()
            .ok_or_else(|| unavailable("Database not connected (offline mode)"))
    }

    async fn get_stored_credential(
        &self,
        subject_id: &str,
    ) -> Result<Option<StoredCredential>, PersistError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(subject_id)
            .await
            .map_err(unavailable)
    }

    async fn get_content_item(
        &self,
        external_id: &str,
    ) -> Result<Option<ContentItem>, PersistError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CONTENT_ITEMS)
            .obj()
            .one(external_id)
            .await
            .map_err(unavailable)
    }

    /// Merge `credential` over the stored one and write it, optionally with the
    /// user document, in one transaction.
    ///
    /// The previous credential (and user) are read through the transaction, so
    /// a concurrent write to either document aborts the commit rather than
    /// being overwritten with a stale refresh token.
    async fn commit_credential(
        &self,
        subject_id: &str,
        credential: Credential,
        record: Option<&UserRecord>,
    ) -> Result<(), PersistError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| unavailable(format!("Failed to begin transaction: {}", e)))?;
        let in_tx = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let staged = self
            .stage_credential(&in_tx, &mut transaction, subject_id, credential, record)
            .await;
        if let Err(e) = staged {
            if let Err(rollback) = transaction.rollback().await {
                tracing::warn!(subject_id, error = %rollback, "Transaction rollback failed");
            }
            return Err(e);
        }

        transaction
            .commit()
            .await
            .map_err(|e| unavailable(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    async fn stage_credential(
        &self,
        in_tx: &firestore::FirestoreDb,
        transaction: &mut firestore::FirestoreTransaction<'_>,
        subject_id: &str,
        credential: Credential,
        record: Option<&UserRecord>,
    ) -> Result<(), PersistError> {
        let previous: Option<StoredCredential> = in_tx
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(subject_id)
            .await
            .map_err(unavailable)?;
        let previous = match previous {
            Some(stored) => Some(self.kms.unseal(subject_id, &stored).await?),
            None => None,
        };
        let sealed = self
            .kms
            .seal(subject_id, &credential.merged_over(previous.as_ref()))
            .await?;

        if let Some(record) = record {
            let existing: Option<UserRecord> = in_tx
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(subject_id)
                .await
                .map_err(unavailable)?;

            let mut record = record.clone();
            if let Some(existing) = existing {
                record.created_at = existing.created_at;
            }

            in_tx
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(subject_id)
                .object(&record)
                .add_to_transaction(transaction)
                .map_err(|e| unavailable(format!("Failed to add user to transaction: {}", e)))?;
        }

        in_tx
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(subject_id)
            .object(&sealed)
            .add_to_transaction(transaction)
            .map_err(|e| {
                unavailable(format!("Failed to add credential to transaction: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_credential(&self, subject_id: &str) -> Result<Option<Credential>, PersistError> {
        match self.get_stored_credential(subject_id).await? {
            Some(stored) => Ok(Some(self.kms.unseal(subject_id, &stored).await?)),
            None => Ok(None),
        }
    }

    async fn put_credential(
        &self,
        subject_id: &str,
        credential: Credential,
    ) -> Result<(), PersistError> {
        self.commit_credential(subject_id, credential, None).await
    }
}

#[async_trait]
impl SnapshotStore for FirestoreDb {
    /// Writes the user document and the credential document in one
    /// transaction, so a crash never leaves one without the other.
    async fn upsert_user_with_credential(
        &self,
        record: &UserRecord,
        credential: Credential,
    ) -> Result<(), PersistError> {
        let subject_id = record.identity.subject_id.as_str();
        self.commit_credential(subject_id, credential, Some(record))
            .await?;

        tracing::debug!(subject_id, "User and credential committed atomically");
        Ok(())
    }

    async fn upsert_contact(&self, contact: &Contact) -> Result<(), PersistError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONTACTS)
            .document_id(contact.dedup_key())
            .object(contact)
            .execute()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn upsert_content_item(&self, item: &ContentItem) -> Result<(), PersistError> {
        let merged = match self.get_content_item(&item.external_id).await? {
            Some(mut stored) => {
                stored.absorb(item);
                stored
            }
            None => item.clone(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONTENT_ITEMS)
            .document_id(&merged.external_id)
            .object(&merged)
            .execute()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get_user(&self, subject_id: &str) -> Result<Option<UserRecord>, PersistError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(subject_id)
            .await
            .map_err(unavailable)
    }

    async fn list_contacts(&self, owner_subject_id: &str) -> Result<Vec<Contact>, PersistError> {
        let owner = owner_subject_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CONTACTS)
            .filter(move |q| q.for_all([q.field("owner_subject_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(unavailable)
    }

    async fn list_content_items(
        &self,
        owner_subject_id: &str,
    ) -> Result<Vec<ContentItem>, PersistError> {
        let owner = owner_subject_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CONTENT_ITEMS)
            .filter(move |q| q.for_all([q.field("owner_subject_id").eq(owner.clone())]))
            .order_by([(
                "published_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(unavailable)
    }
}
