// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Snapshot upserter: persists one aggregation pass.
//!
//! The user row and credential are written first, as one atomic unit. Contacts
//! and content items follow; each of those is idempotent on its own key, so a
//! failed pass can simply be re-run.

use crate::db::SnapshotStore;
use crate::error::PersistError;
use crate::models::{Contact, ContentItem, Credential, Identity, ProfileFacets, UserRecord};
use crate::time_utils::format_utc_rfc3339;
use futures_util::{stream, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;

/// Upper bound on in-flight contact/content writes.
const WRITE_CONCURRENCY: usize = 8;

/// What one commit wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub contacts: usize,
    pub content_items: usize,
}

#[derive(Clone)]
pub struct SnapshotUpserter {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotUpserter {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Persist identity, credential, facets, contacts and content items.
    ///
    /// Re-running with identical input leaves the store unchanged apart from
    /// `updated_at`.
    pub async fn commit(
        &self,
        identity: &Identity,
        credential: Credential,
        facets: &ProfileFacets,
        contacts: &[Contact],
        content_items: &[ContentItem],
    ) -> Result<CommitSummary, PersistError> {
        let subject_id = identity.subject_id.as_str();
        let now = format_utc_rfc3339(chrono::Utc::now());

        let record = UserRecord {
            identity: identity.clone(),
            facets: facets.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.store
            .upsert_user_with_credential(&record, credential)
            .await?;
        tracing::debug!(subject_id, "User row and credential written");

        stream::iter(contacts.iter().map(Ok::<_, PersistError>))
            .try_for_each_concurrent(WRITE_CONCURRENCY, |contact| async move {
                self.store.upsert_contact(contact).await
            })
            .await?;

        stream::iter(content_items.iter().map(Ok::<_, PersistError>))
            .try_for_each_concurrent(WRITE_CONCURRENCY, |item| async move {
                self.store.upsert_content_item(item).await
            })
            .await?;

        let summary = CommitSummary {
            contacts: contacts.len(),
            content_items: content_items.len(),
        };
        tracing::info!(
            subject_id,
            contacts = summary.contacts,
            content_items = summary.content_items,
            "Snapshot committed"
        );
        Ok(summary)
    }
}
