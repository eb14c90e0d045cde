// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Which OAuth scopes unlock which remote data.
//!
//! A [`ScopeRegistry`] pairs a static capability → scope mapping with the
//! scopes Google actually granted. Google's consent screen lets users untick
//! individual permissions, so the granted set is frequently smaller than the
//! requested one; the aggregator asks the registry before every fetch.

use std::collections::{BTreeMap, BTreeSet};

const USERINFO_EMAIL: &str = "https://www.googleapis.com/auth/userinfo.email";
const USERINFO_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";
const BIRTHDAY: &str = "https://www.googleapis.com/auth/user.birthday.read";
const GENDER: &str = "https://www.googleapis.com/auth/user.gender.read";
const ORGANIZATION: &str = "https://www.googleapis.com/auth/user.organization.read";
const PHONE_NUMBERS: &str = "https://www.googleapis.com/auth/user.phonenumbers.read";
const ADDRESSES: &str = "https://www.googleapis.com/auth/user.addresses.read";
const AGE_RANGE: &str = "https://www.googleapis.com/auth/profile.agerange.read";
const LANGUAGE: &str = "https://www.googleapis.com/auth/profile.language.read";
const CONTACTS: &str = "https://www.googleapis.com/auth/contacts";
const CONTACTS_READONLY: &str = "https://www.googleapis.com/auth/contacts.readonly";
const YOUTUBE: &str = "https://www.googleapis.com/auth/youtube";
const YOUTUBE_READONLY: &str = "https://www.googleapis.com/auth/youtube.readonly";
const YOUTUBE_FORCE_SSL: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// A category of remote data the app can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    ReadIdentity,
    ReadBirthday,
    ReadGender,
    ReadOrganization,
    ReadPhoneNumbers,
    ReadAddresses,
    ReadAgeRange,
    ReadLanguage,
    ReadContacts,
    ReadContentLibrary,
}

impl Capability {
    /// The demographic capabilities (birthday through language).
    pub const DEMOGRAPHICS: [Capability; 7] = [
        Capability::ReadBirthday,
        Capability::ReadGender,
        Capability::ReadOrganization,
        Capability::ReadPhoneNumbers,
        Capability::ReadAddresses,
        Capability::ReadAgeRange,
        Capability::ReadLanguage,
    ];
}

/// Immutable capability → scope mapping plus the granted scope set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRegistry {
    /// Any one of the listed scopes unlocks the capability.
    mapping: BTreeMap<Capability, Vec<String>>,
    granted: BTreeSet<String>,
}

impl ScopeRegistry {
    /// Google's mapping, with nothing granted yet.
    pub fn google() -> Self {
        let entries: [(Capability, &[&str]); 10] = [
            (Capability::ReadIdentity, &[USERINFO_EMAIL, USERINFO_PROFILE]),
            (Capability::ReadBirthday, &[BIRTHDAY]),
            (Capability::ReadGender, &[GENDER]),
            (Capability::ReadOrganization, &[ORGANIZATION]),
            (Capability::ReadPhoneNumbers, &[PHONE_NUMBERS]),
            (Capability::ReadAddresses, &[ADDRESSES]),
            (Capability::ReadAgeRange, &[AGE_RANGE]),
            (Capability::ReadLanguage, &[LANGUAGE]),
            (Capability::ReadContacts, &[CONTACTS, CONTACTS_READONLY]),
            (
                Capability::ReadContentLibrary,
                &[YOUTUBE_READONLY, YOUTUBE, YOUTUBE_FORCE_SSL],
            ),
        ];

        let mapping = entries
            .into_iter()
            .map(|(cap, scopes)| (cap, scopes.iter().map(|s| s.to_string()).collect()))
            .collect();

        Self {
            mapping,
            granted: BTreeSet::new(),
        }
    }

    /// The same mapping with `granted` as the granted scope set.
    pub fn with_granted<I, S>(&self, granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mapping: self.mapping.clone(),
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether any scope mapped to `capability` was granted.
    pub fn has(&self, capability: Capability) -> bool {
        self.mapping
            .get(&capability)
            .is_some_and(|scopes| scopes.iter().any(|s| self.granted.contains(s)))
    }

    pub fn has_demographics(&self) -> bool {
        Capability::DEMOGRAPHICS.iter().any(|cap| self.has(*cap))
    }

    /// Every scope the app asks for, in a stable order, for the
    /// authorization URL.
    pub fn requested_scopes(&self) -> Vec<&str> {
        let all: BTreeSet<&str> = self
            .mapping
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        all.into_iter().collect()
    }

    pub fn granted(&self) -> &BTreeSet<String> {
        &self.granted
    }
}

/// Parse the space-delimited `scope` value of a token response.
pub fn parse_scope_list(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_granted_by_default() {
        let registry = ScopeRegistry::google();
        assert!(!registry.has(Capability::ReadIdentity));
        assert!(!registry.has(Capability::ReadContacts));
        assert!(!registry.has_demographics());
    }

    #[test]
    fn test_any_of_scope_unlocks_capability() {
        let registry = ScopeRegistry::google().with_granted([CONTACTS_READONLY]);
        assert!(registry.has(Capability::ReadContacts));

        let registry = ScopeRegistry::google().with_granted([YOUTUBE_FORCE_SSL]);
        assert!(registry.has(Capability::ReadContentLibrary));
    }

    #[test]
    fn test_partial_grant() {
        let registry =
            ScopeRegistry::google().with_granted([USERINFO_EMAIL, BIRTHDAY, CONTACTS]);

        assert!(registry.has(Capability::ReadIdentity));
        assert!(registry.has(Capability::ReadBirthday));
        assert!(registry.has(Capability::ReadContacts));
        assert!(!registry.has(Capability::ReadGender));
        assert!(!registry.has(Capability::ReadContentLibrary));
        assert!(registry.has_demographics());
    }

    #[test]
    fn test_unknown_scopes_grant_nothing() {
        let registry = ScopeRegistry::google().with_granted(["openid", "contacts"]);
        assert!(!registry.has(Capability::ReadContacts));
    }

    #[test]
    fn test_requested_scopes_cover_mapping() {
        let registry = ScopeRegistry::google();
        let scopes = registry.requested_scopes();
        assert_eq!(scopes.len(), 14);
        assert!(scopes.contains(&LANGUAGE));
        assert!(scopes.contains(&YOUTUBE_READONLY));
    }

    #[test]
    fn test_parse_scope_list() {
        let scopes = parse_scope_list("openid  https://www.googleapis.com/auth/contacts\n");
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("openid"));
        assert!(scopes.contains(CONTACTS));
    }
}
