// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile aggregator: identity plus every scope-gated facet.
//!
//! The identity fetch is the only one allowed to fail the pass. Every other
//! facet is listed in [`FACET_TABLE`] with the capability that gates it; the
//! table is walked once, ungranted facets are skipped without a request, and
//! the rest run concurrently. A failing facet is logged and left absent.

use crate::error::AggregationError;
use crate::models::{Address, Contact, ContentItem, Credential, Identity, PhoneNumber, ProfileFacets};
use crate::services::google::{
    ConnectionsResponse, GoogleApiError, GoogleClient, Person, ValueField, VideoListResponse,
};
use crate::services::scopes::{Capability, ScopeRegistry};
use crate::time_utils::normalize_rfc3339;
use futures_util::{stream, StreamExt};

/// One piece of remote data beyond the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Birthday,
    Gender,
    Organization,
    PhoneNumbers,
    Addresses,
    AgeRange,
    Languages,
    Contacts,
    ContentLibrary,
}

/// Which capability each facet needs.
pub const FACET_TABLE: [(Facet, Capability); 9] = [
    (Facet::Birthday, Capability::ReadBirthday),
    (Facet::Gender, Capability::ReadGender),
    (Facet::Organization, Capability::ReadOrganization),
    (Facet::PhoneNumbers, Capability::ReadPhoneNumbers),
    (Facet::Addresses, Capability::ReadAddresses),
    (Facet::AgeRange, Capability::ReadAgeRange),
    (Facet::Languages, Capability::ReadLanguage),
    (Facet::Contacts, Capability::ReadContacts),
    (Facet::ContentLibrary, Capability::ReadContentLibrary),
];

impl Facet {
    /// People API `personFields` value for the demographic facets.
    fn person_fields(self) -> Option<&'static str> {
        match self {
            Facet::Birthday => Some("birthdays"),
            Facet::Gender => Some("genders"),
            Facet::Organization => Some("organizations"),
            Facet::PhoneNumbers => Some("phoneNumbers"),
            Facet::Addresses => Some("addresses"),
            Facet::AgeRange => Some("ageRanges"),
            Facet::Languages => Some("locales"),
            Facet::Contacts | Facet::ContentLibrary => None,
        }
    }
}

/// Data one facet fetch produced.
#[derive(Debug, Clone, PartialEq)]
enum FacetData {
    Birthday(String),
    Gender(String),
    Organization(String),
    PhoneNumbers(Vec<PhoneNumber>),
    Addresses(Vec<Address>),
    AgeRange(String),
    Languages(Vec<String>),
    Contacts(Vec<Contact>),
    ContentItems(Vec<ContentItem>),
}

/// Everything one aggregation pass learned about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedProfile {
    pub identity: Identity,
    pub facets: ProfileFacets,
    pub contacts: Vec<Contact>,
    pub content_items: Vec<ContentItem>,
}

impl AggregatedProfile {
    fn apply(&mut self, data: FacetData) {
        match data {
            FacetData::Birthday(v) => self.facets.birthday = Some(v),
            FacetData::Gender(v) => self.facets.gender = Some(v),
            FacetData::Organization(v) => self.facets.organization = Some(v),
            FacetData::PhoneNumbers(v) => self.facets.phone_numbers = Some(v),
            FacetData::Addresses(v) => self.facets.addresses = Some(v),
            FacetData::AgeRange(v) => self.facets.age_range = Some(v),
            FacetData::Languages(v) => self.facets.language_preferences = Some(v),
            FacetData::Contacts(v) => self.contacts = v,
            FacetData::ContentItems(v) => self.content_items = v,
        }
    }
}

/// Fetches identity and facets with one access token.
#[derive(Clone)]
pub struct ProfileAggregator {
    client: GoogleClient,
    concurrency: usize,
    contacts_page_size: u32,
    videos_page_size: u32,
}

impl ProfileAggregator {
    pub fn new(
        client: GoogleClient,
        concurrency: usize,
        contacts_page_size: u32,
        videos_page_size: u32,
    ) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            contacts_page_size,
            videos_page_size,
        }
    }

    /// Run one aggregation pass with the token in `credential`.
    ///
    /// The token is not re-checked for expiry during the pass.
    pub async fn aggregate(
        &self,
        credential: &Credential,
        registry: &ScopeRegistry,
    ) -> Result<AggregatedProfile, AggregationError> {
        let access_token = credential.access_token.as_str();

        let userinfo = self.client.get_userinfo(access_token).await.map_err(|e| {
            tracing::warn!(error = %e, "Identity fetch failed");
            AggregationError::IdentityFetchFailed(e.to_string())
        })?;

        let identity = Identity {
            subject_id: userinfo.id,
            email: userinfo.email,
            display_name: userinfo.name,
            avatar_url: userinfo.picture,
        };
        let subject_id = identity.subject_id.as_str();

        let granted: Vec<Facet> = FACET_TABLE
            .iter()
            .filter(|(_, capability)| registry.has(*capability))
            .map(|(facet, _)| *facet)
            .collect();

        tracing::debug!(subject_id, facets = ?granted, "Fetching granted facets");

        let results: Vec<(Facet, Result<Option<FacetData>, GoogleApiError>)> =
            stream::iter(granted)
                .map(|facet| async move {
                    (facet, self.fetch_facet(facet, access_token, subject_id).await)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut profile = AggregatedProfile {
            identity: identity.clone(),
            facets: ProfileFacets::default(),
            contacts: Vec::new(),
            content_items: Vec::new(),
        };

        for (facet, result) in results {
            match result {
                Ok(Some(data)) => profile.apply(data),
                Ok(None) => tracing::debug!(subject_id, ?facet, "Facet empty"),
                Err(e) => tracing::warn!(
                    subject_id,
                    ?facet,
                    error = %e,
                    transient = e.is_transient(),
                    "Facet fetch failed, treating as absent"
                ),
            }
        }

        tracing::info!(
            subject_id,
            contacts = profile.contacts.len(),
            content_items = profile.content_items.len(),
            "Aggregation pass complete"
        );

        Ok(profile)
    }

    async fn fetch_facet(
        &self,
        facet: Facet,
        access_token: &str,
        subject_id: &str,
    ) -> Result<Option<FacetData>, GoogleApiError> {
        match facet {
            Facet::Contacts => {
                let page = self
                    .client
                    .list_connections(access_token, self.contacts_page_size)
                    .await?;
                Ok(Some(FacetData::Contacts(contacts_from(page, subject_id))))
            }
            Facet::ContentLibrary => {
                let page = self
                    .client
                    .list_liked_videos(access_token, self.videos_page_size)
                    .await?;
                Ok(Some(FacetData::ContentItems(content_items_from(
                    page, subject_id,
                ))))
            }
            demographic => {
                let Some(fields) = demographic.person_fields() else {
                    return Ok(None);
                };
                let person = self.client.get_person(access_token, fields).await?;
                Ok(demographic_from(demographic, &person))
            }
        }
    }
}

// ─── Response Extraction ─────────────────────────────────────────────────────

fn first_value(values: &[ValueField]) -> Option<String> {
    values.iter().find_map(|v| v.value.clone())
}

fn demographic_from(facet: Facet, person: &Person) -> Option<FacetData> {
    match facet {
        Facet::Birthday => person
            .birthdays
            .iter()
            .filter_map(|b| b.date.as_ref())
            .find_map(|d| format_birthday(d.year, d.month?, d.day?))
            .map(FacetData::Birthday),
        Facet::Gender => first_value(&person.genders).map(FacetData::Gender),
        Facet::Organization => person
            .organizations
            .iter()
            .find_map(|o| o.name.clone())
            .map(FacetData::Organization),
        Facet::PhoneNumbers => {
            let numbers: Vec<PhoneNumber> = person
                .phone_numbers
                .iter()
                .filter_map(|p| {
                    Some(PhoneNumber {
                        kind: p.kind.clone(),
                        number: p.value.clone()?,
                    })
                })
                .collect();
            (!numbers.is_empty()).then_some(FacetData::PhoneNumbers(numbers))
        }
        Facet::Addresses => {
            let addresses: Vec<Address> = person
                .addresses
                .iter()
                .filter_map(|a| {
                    Some(Address {
                        kind: a.kind.clone(),
                        formatted: a.formatted_value.clone()?,
                    })
                })
                .collect();
            (!addresses.is_empty()).then_some(FacetData::Addresses(addresses))
        }
        Facet::AgeRange => person
            .age_ranges
            .iter()
            .find_map(|a| a.age_range.clone())
            .map(FacetData::AgeRange),
        Facet::Languages => {
            let codes: Vec<String> = person.locales.iter().filter_map(|l| l.value.clone()).collect();
            (!codes.is_empty()).then_some(FacetData::Languages(codes))
        }
        Facet::Contacts | Facet::ContentLibrary => None,
    }
}

/// `YYYY-MM-DD`, or `--MM-DD` when the year is withheld.
fn format_birthday(year: Option<i32>, month: u32, day: u32) -> Option<String> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(match year {
        Some(year) => format!("{:04}-{:02}-{:02}", year, month, day),
        None => format!("--{:02}-{:02}", month, day),
    })
}

fn contacts_from(page: ConnectionsResponse, owner_subject_id: &str) -> Vec<Contact> {
    page.connections
        .into_iter()
        .map(|person| Contact {
            owner_subject_id: owner_subject_id.to_string(),
            name: person.names.iter().find_map(|n| n.display_name.clone()),
            email: first_value(&person.email_addresses),
            phone: person.phone_numbers.iter().find_map(|p| p.value.clone()),
        })
        .filter(|contact| !contact.is_blank())
        .collect()
}

fn content_items_from(page: VideoListResponse, owner_subject_id: &str) -> Vec<ContentItem> {
    page.items
        .into_iter()
        .filter_map(|video| {
            let snippet = video.snippet?;
            Some(ContentItem {
                external_id: video.id,
                owner_subject_id: owner_subject_id.to_string(),
                title: snippet.title.unwrap_or_default(),
                thumbnail_url: snippet
                    .thumbnails
                    .and_then(|t| t.default)
                    .map(|t| t.url),
                published_at: snippet.published_at.as_deref().and_then(normalize_rfc3339),
            })
        })
        .collect()
}
