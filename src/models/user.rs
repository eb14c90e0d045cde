//! User identity and profile facets for storage and API.

use serde::{Deserialize, Serialize};

/// Identity as reported by Google's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Google account ID (also used as document ID)
    pub subject_id: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Profile picture URL
    pub avatar_url: Option<String>,
}

/// A phone number from the People API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// "mobile", "home", ... (free-form, as returned by Google)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub number: String,
}

/// A postal address from the People API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub formatted: String,
}

/// Optional profile fields. Each is present only if its scope was granted
/// and Google returned data for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFacets {
    /// `YYYY-MM-DD`, or `--MM-DD` when the year is not shared
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub organization: Option<String>,
    pub phone_numbers: Option<Vec<PhoneNumber>>,
    pub addresses: Option<Vec<Address>>,
    /// e.g. "TWENTY_ONE_OR_OLDER"
    pub age_range: Option<String>,
    /// BCP-47 language codes
    pub language_preferences: Option<Vec<String>>,
}

impl ProfileFacets {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// User document stored in Firestore: identity plus the latest facets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity: Identity,
    pub facets: ProfileFacets,
    /// When the user first connected
    pub created_at: String,
    /// Last successful aggregation pass
    pub updated_at: String,
}
