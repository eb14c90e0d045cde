// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Contact and content-library models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One of the user's Google contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub owner_subject_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    /// A contact with nothing but an owner carries no information.
    pub fn is_blank(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Stable document ID used to deduplicate repeated ingestion.
    ///
    /// Keyed by (owner, email, phone). Only when both email and phone are
    /// missing does the name take part, so that distinct name-only contacts
    /// don't collapse into one.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.owner_subject_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.email.as_deref().unwrap_or("").to_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.phone.as_deref().unwrap_or("").as_bytes());
        if self.email.is_none() && self.phone.is_none() {
            hasher.update([0u8]);
            hasher.update(self.name.as_deref().unwrap_or("").as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A video from the user's YouTube library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// YouTube video ID (also used as document ID; unique across all users)
    pub external_id: String,
    /// Subject that first ingested the video
    pub owner_subject_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Publication time (RFC 3339)
    pub published_at: Option<String>,
}

impl ContentItem {
    /// Apply a re-ingested copy: mutable fields win, ownership stays.
    pub fn absorb(&mut self, latest: &ContentItem) {
        self.title = latest.title.clone();
        self.thumbnail_url = latest.thumbnail_url.clone();
        self.published_at = latest.published_at.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> Contact {
        Contact {
            owner_subject_id: "u1".to_string(),
            name: name.map(String::from),
            email: email.map(String::from),
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn test_dedup_key_ignores_name_when_email_present() {
        let a = contact(Some("Ann"), Some("ann@example.com"), None);
        let b = contact(Some("Ann B."), Some("ANN@example.com"), None);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_phone() {
        let a = contact(None, Some("ann@example.com"), Some("+1 555 0100"));
        let b = contact(None, Some("ann@example.com"), Some("+1 555 0101"));
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_name_only_contacts() {
        let a = contact(Some("Ann"), None, None);
        let b = contact(Some("Bob"), None, None);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_scoped_by_owner() {
        let a = contact(None, Some("ann@example.com"), None);
        let mut b = a.clone();
        b.owner_subject_id = "u2".to_string();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_blank_contact() {
        assert!(contact(None, None, None).is_blank());
        assert!(!contact(Some("Ann"), None, None).is_blank());
    }

    #[test]
    fn test_absorb_keeps_owner() {
        let mut stored = ContentItem {
            external_id: "v1".to_string(),
            owner_subject_id: "u1".to_string(),
            title: "Old".to_string(),
            thumbnail_url: None,
            published_at: None,
        };
        let latest = ContentItem {
            external_id: "v1".to_string(),
            owner_subject_id: "u2".to_string(),
            title: "New".to_string(),
            thumbnail_url: Some("https://i.ytimg.com/vi/v1/default.jpg".to_string()),
            published_at: Some("2024-05-01T12:00:00Z".to_string()),
        };

        stored.absorb(&latest);

        assert_eq!(stored.owner_subject_id, "u1");
        assert_eq!(stored.title, "New");
        assert_eq!(stored.published_at.as_deref(), Some("2024-05-01T12:00:00Z"));
    }
}
