//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables (Cloud Run secret bindings
//! in production, a `.env` file for local development).

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which storage backend the server persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// In-process storage, lost on restart. Local development only.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Redirect URI registered with Google for the callback route
    pub google_redirect_uri: String,
    /// Frontend URL for post-login redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,

    // --- Provider call limits ---
    /// Upper bound on every call to Google
    pub http_timeout: Duration,
    /// How many facet fetches may run at once within one aggregation pass
    pub facet_concurrency: usize,
    /// Page size for the contacts listing (first page only)
    pub contacts_page_size: u32,
    /// Page size for the video listing (first page only)
    pub videos_page_size: u32,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            http_timeout: Duration::from_secs(5),
            facet_concurrency: 4,
            contacts_page_size: 100,
            videos_page_size: 10,
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = required("JWT_SIGNING_KEY")?.into_bytes();
        // Fall back to the JWT key so a single secret is enough for local dev.
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.into_bytes())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            port: parsed_or("PORT", 8080)?,
            storage_backend: env::var("STORAGE_BACKEND")
                .map(|v| v.parse())
                .unwrap_or(Ok(StorageBackend::Firestore))?,
            http_timeout: Duration::from_secs(parsed_or("HTTP_TIMEOUT_SECS", 10)?),
            facet_concurrency: parsed_or::<usize>("FACET_CONCURRENCY", 4)?.max(1),
            contacts_page_size: parsed_or("CONTACTS_PAGE_SIZE", 100)?,
            videos_page_size: parsed_or("VIDEOS_PAGE_SIZE", 10)?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            jwt_signing_key,
            oauth_state_key,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
