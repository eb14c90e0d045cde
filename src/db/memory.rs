// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend.
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and tests. The user
//! row and credential of a subject live in one map entry, so writing them
//! together under the entry lock is atomic.

use crate::db::{CredentialStore, SnapshotStore};
use crate::error::PersistError;
use crate::models::{Contact, ContentItem, Credential, UserRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct SubjectEntry {
    user: Option<UserRecord>,
    credential: Option<Credential>,
}

#[derive(Default)]
struct Tables {
    subjects: DashMap<String, SubjectEntry>,
    contacts: DashMap<String, Contact>,
    content_items: DashMap<String, ContentItem>,
    offline: AtomicBool,
}

/// In-memory database. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.tables.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contact_count(&self) -> usize {
        self.tables.contacts.len()
    }

    pub fn content_item_count(&self) -> usize {
        self.tables.content_items.len()
    }

    fn check_online(&self) -> Result<(), PersistError> {
        if self.tables.offline.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn get_credential(&self, subject_id: &str) -> Result<Option<Credential>, PersistError> {
        self.check_online()?;
        Ok(self
            .tables
            .subjects
            .get(subject_id)
            .and_then(|entry| entry.credential.clone()))
    }

    async fn put_credential(
        &self,
        subject_id: &str,
        credential: Credential,
    ) -> Result<(), PersistError> {
        self.check_online()?;
        let mut entry = self
            .tables
            .subjects
            .entry(subject_id.to_string())
            .or_default();
        let merged = credential.merged_over(entry.credential.as_ref());
        entry.credential = Some(merged);
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryDb {
    async fn upsert_user_with_credential(
        &self,
        record: &UserRecord,
        credential: Credential,
    ) -> Result<(), PersistError> {
        self.check_online()?;
        let mut entry = self
            .tables
            .subjects
            .entry(record.identity.subject_id.clone())
            .or_default();

        let mut record = record.clone();
        if let Some(existing) = &entry.user {
            record.created_at = existing.created_at.clone();
        }
        let merged = credential.merged_over(entry.credential.as_ref());

        entry.user = Some(record);
        entry.credential = Some(merged);
        Ok(())
    }

    async fn upsert_contact(&self, contact: &Contact) -> Result<(), PersistError> {
        self.check_online()?;
        self.tables
            .contacts
            .insert(contact.dedup_key(), contact.clone());
        Ok(())
    }

    async fn upsert_content_item(&self, item: &ContentItem) -> Result<(), PersistError> {
        self.check_online()?;
        self.tables
            .content_items
            .entry(item.external_id.clone())
            .and_modify(|stored| stored.absorb(item))
            .or_insert_with(|| item.clone());
        Ok(())
    }

    async fn get_user(&self, subject_id: &str) -> Result<Option<UserRecord>, PersistError> {
        self.check_online()?;
        Ok(self
            .tables
            .subjects
            .get(subject_id)
            .and_then(|entry| entry.user.clone()))
    }

    async fn list_contacts(&self, owner_subject_id: &str) -> Result<Vec<Contact>, PersistError> {
        self.check_online()?;
        Ok(self
            .tables
            .contacts
            .iter()
            .filter(|c| c.owner_subject_id == owner_subject_id)
            .map(|c| c.value().clone())
            .collect())
    }

    async fn list_content_items(
        &self,
        owner_subject_id: &str,
    ) -> Result<Vec<ContentItem>, PersistError> {
        self.check_online()?;
        let mut items: Vec<ContentItem> = self
            .tables
            .content_items
            .iter()
            .filter(|item| item.owner_subject_id == owner_subject_id)
            .map(|item| item.value().clone())
            .collect();
        // Newest first, like the dashboard shows them
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, ProfileFacets};
    use std::collections::BTreeSet;

    fn credential(access: &str, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: refresh.map(String::from),
            expires_at: None,
            granted_scopes: BTreeSet::from(["openid".to_string()]),
        }
    }

    fn record(subject_id: &str, created_at: &str) -> UserRecord {
        UserRecord {
            identity: Identity {
                subject_id: subject_id.to_string(),
                email: Some("a@b.com".to_string()),
                display_name: None,
                avatar_url: None,
            },
            facets: ProfileFacets::default(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_preserves_refresh_token() {
        let db = MemoryDb::new();
        db.put_credential("u1", credential("AT1", Some("RT1")))
            .await
            .unwrap();
        db.put_credential("u1", credential("AT2", None)).await.unwrap();

        let stored = db.get_credential("u1").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "AT2");
        assert_eq!(stored.refresh_token.as_deref(), Some("RT1"));
    }

    #[tokio::test]
    async fn test_get_missing_credential() {
        let db = MemoryDb::new();
        assert!(db.get_credential("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_store_reports_unavailable() {
        let db = MemoryDb::new();
        db.set_offline(true);

        let err = db
            .put_credential("u1", credential("AT1", Some("RT1")))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Unavailable(_)));

        db.set_offline(false);
        assert!(db.get_credential("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_upsert_keeps_created_at() {
        let db = MemoryDb::new();
        db.upsert_user_with_credential(&record("u1", "2024-01-01T00:00:00Z"), credential("AT1", None))
            .await
            .unwrap();
        db.upsert_user_with_credential(&record("u1", "2024-06-01T00:00:00Z"), credential("AT2", None))
            .await
            .unwrap();

        let user = db.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(user.updated_at, "2024-06-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_content_items_sorted_newest_first() {
        let db = MemoryDb::new();
        for (id, published) in [("a", "2024-01-01T00:00:00Z"), ("b", "2024-03-01T00:00:00Z")] {
            db.upsert_content_item(&ContentItem {
                external_id: id.to_string(),
                owner_subject_id: "u1".to_string(),
                title: id.to_string(),
                thumbnail_url: None,
                published_at: Some(published.to_string()),
            })
            .await
            .unwrap();
        }

        let items = db.list_content_items("u1").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
