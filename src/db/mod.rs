//! Database layer.
//!
//! Two traits describe what the core needs from storage; `FirestoreDb` is the
//! production backend and `MemoryDb` the in-process one.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::PersistError;
use crate::models::{Contact, ContentItem, Credential, UserRecord};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CREDENTIALS: &str = "credentials";
    /// Keyed by `Contact::dedup_key`
    pub const CONTACTS: &str = "contacts";
    /// Keyed by YouTube video ID
    pub const CONTENT_ITEMS: &str = "content_items";
}

/// Per-subject credential storage.
///
/// `put_credential` fully replaces the stored credential except for the
/// refresh token, which is kept when the incoming credential has none.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, subject_id: &str) -> Result<Option<Credential>, PersistError>;

    async fn put_credential(
        &self,
        subject_id: &str,
        credential: Credential,
    ) -> Result<(), PersistError>;
}

/// Storage for the aggregated snapshot of a user.
#[async_trait]
pub trait SnapshotStore: CredentialStore {
    /// Write the user row and credential as one atomic unit.
    ///
    /// `created_at` of an existing user row is kept; the refresh token rule of
    /// [`CredentialStore::put_credential`] applies.
    async fn upsert_user_with_credential(
        &self,
        record: &UserRecord,
        credential: Credential,
    ) -> Result<(), PersistError>;

    /// Insert a contact unless one with the same dedup key already exists.
    async fn upsert_contact(&self, contact: &Contact) -> Result<(), PersistError>;

    /// Upsert a content item by external ID. An existing item keeps its owner.
    async fn upsert_content_item(&self, item: &ContentItem) -> Result<(), PersistError>;

    async fn get_user(&self, subject_id: &str) -> Result<Option<UserRecord>, PersistError>;

    async fn list_contacts(&self, owner_subject_id: &str) -> Result<Vec<Contact>, PersistError>;

    async fn list_content_items(
        &self,
        owner_subject_id: &str,
    ) -> Result<Vec<ContentItem>, PersistError>;
}
