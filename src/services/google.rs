// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google API client.
//!
//! Handles:
//! - Authorization code and refresh token grants
//! - userinfo, People API and YouTube Data API reads
//! - Classifying failures as terminal or transient
//!
//! Every request carries the client-wide timeout; a timeout is reported as a
//! network error, which callers treat as transient.

use serde::Deserialize;
use std::time::Duration;

/// Where each Google API lives. Overridable so tests can point at a mock.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// Consent screen the browser is sent to
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// `people/me` resource; connections are listed under it
    pub people_me_url: String,
    pub youtube_videos_url: String,
}

impl GoogleEndpoints {
    pub fn production() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v1/userinfo".to_string(),
            people_me_url: "https://people.googleapis.com/v1/people/me".to_string(),
            youtube_videos_url: "https://www.googleapis.com/youtube/v3/videos".to_string(),
        }
    }

    /// Same paths as production, rooted at `base` (e.g. a mock server URI).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            userinfo_url: format!("{}/oauth2/v1/userinfo", base),
            people_me_url: format!("{}/v1/people/me", base),
            youtube_videos_url: format!("{}/youtube/v3/videos", base),
        }
    }
}

/// Failure talking to Google.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GoogleApiError {
    /// OAuth `invalid_grant`: bad/expired code or revoked refresh token.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("access token rejected (401)")]
    Unauthorized,

    /// Usually a scope that was not granted.
    #[error("forbidden (403): {0}")]
    Forbidden(String),

    #[error("rate limited (429)")]
    RateLimited,

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    /// Connect failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl GoogleApiError {
    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GoogleApiError::RateLimited
            | GoogleApiError::Network(_)
            | GoogleApiError::Decode(_) => true,
            GoogleApiError::Status(code, _) => *code >= 500,
            GoogleApiError::InvalidGrant(_)
            | GoogleApiError::Unauthorized
            | GoogleApiError::Forbidden(_) => false,
        }
    }
}

/// OAuth error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    /// Create a new Google client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        endpoints: GoogleEndpoints,
        timeout: Duration,
    ) -> Result<Self, GoogleApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GoogleApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Consent-screen URL asking for `scopes` with offline access.
    ///
    /// `prompt=consent` makes Google issue a refresh token on every
    /// authorization, not just the first.
    pub fn authorization_url(&self, scopes: &[&str], state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
             access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    // ─── Token Endpoint ──────────────────────────────────────────

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleApiError> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, GoogleApiError> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, GoogleApiError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| GoogleApiError::Network(format!("Token request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    // ─── Resource Endpoints ──────────────────────────────────────

    /// Get the signed-in user's identity.
    pub async fn get_userinfo(&self, access_token: &str) -> Result<UserInfo, GoogleApiError> {
        self.get_json(&self.endpoints.userinfo_url, access_token, &[("alt", "json")])
            .await
    }

    /// Read selected fields of the user's own People API record.
    pub async fn get_person(
        &self,
        access_token: &str,
        person_fields: &str,
    ) -> Result<Person, GoogleApiError> {
        self.get_json(
            &self.endpoints.people_me_url,
            access_token,
            &[("personFields", person_fields)],
        )
        .await
    }

    /// First page of the user's contacts.
    pub async fn list_connections(
        &self,
        access_token: &str,
        page_size: u32,
    ) -> Result<ConnectionsResponse, GoogleApiError> {
        let url = format!("{}/connections", self.endpoints.people_me_url);
        let page_size = page_size.to_string();
        self.get_json(
            &url,
            access_token,
            &[
                ("personFields", "names,emailAddresses,phoneNumbers"),
                ("pageSize", page_size.as_str()),
            ],
        )
        .await
    }

    /// First page of videos the user liked.
    pub async fn list_liked_videos(
        &self,
        access_token: &str,
        max_results: u32,
    ) -> Result<VideoListResponse, GoogleApiError> {
        let max_results = max_results.to_string();
        self.get_json(
            &self.endpoints.youtube_videos_url,
            access_token,
            &[
                ("part", "snippet"),
                ("myRating", "like"),
                ("maxResults", max_results.as_str()),
            ],
        )
        .await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GoogleApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| GoogleApiError::Network(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GoogleApiError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| GoogleApiError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();

        if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(&body) {
            if oauth.error == "invalid_grant" {
                return Err(GoogleApiError::InvalidGrant(
                    oauth.error_description.unwrap_or(oauth.error),
                ));
            }
        }

        match status.as_u16() {
            401 => Err(GoogleApiError::Unauthorized),
            403 => Err(GoogleApiError::Forbidden(body)),
            429 => {
                tracing::warn!("Google rate limit hit (429)");
                Err(GoogleApiError::RateLimited)
            }
            code => Err(GoogleApiError::Status(code, body)),
        }
    }
}

// ─── Response Types ──────────────────────────────────────────────

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// `oauth2/v1/userinfo` response.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// People API person. Only the fields that were requested are populated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub birthdays: Vec<Birthday>,
    pub genders: Vec<ValueField>,
    pub organizations: Vec<Organization>,
    pub phone_numbers: Vec<PersonPhoneNumber>,
    pub addresses: Vec<PersonAddress>,
    pub age_ranges: Vec<AgeRangeField>,
    pub locales: Vec<ValueField>,
    pub names: Vec<PersonName>,
    pub email_addresses: Vec<ValueField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Birthday {
    #[serde(default)]
    pub date: Option<PartialDate>,
}

/// A date where any component may be withheld.
#[derive(Debug, Clone, Deserialize)]
pub struct PartialDate {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueField {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonPhoneNumber {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonAddress {
    #[serde(default)]
    pub formatted_value: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRangeField {
    #[serde(default)]
    pub age_range: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// `people/me/connections` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub connections: Vec<Person>,
}

/// YouTube `videos.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GoogleClient {
        GoogleClient::new(
            "cid".to_string(),
            "secret".to_string(),
            "http://localhost/cb".to_string(),
            GoogleEndpoints::with_base(&server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_transient_classification() {
        assert!(GoogleApiError::RateLimited.is_transient());
        assert!(GoogleApiError::Network("timeout".to_string()).is_transient());
        assert!(GoogleApiError::Status(503, String::new()).is_transient());
        assert!(!GoogleApiError::Status(404, String::new()).is_transient());
        assert!(!GoogleApiError::InvalidGrant("bad".to_string()).is_transient());
        assert!(!GoogleApiError::Forbidden(String::new()).is_transient());
    }

    #[test]
    fn test_authorization_url_requests_offline_access() {
        let client = GoogleClient::new(
            "cid".to_string(),
            "secret".to_string(),
            "http://localhost/cb".to_string(),
            GoogleEndpoints::production(),
            Duration::from_secs(2),
        )
        .unwrap();

        let url = client.authorization_url(&["openid", "email"], "st");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?client_id=cid&"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fcb"));
        assert!(url.contains("scope=openid%20email"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("include_granted_scopes=true"));
        assert!(url.ends_with("&state=st"));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT1",
                "refresh_token": "RT1",
                "expires_in": 3599,
                "scope": "openid https://www.googleapis.com/auth/contacts",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server).exchange_code("abc123").await.unwrap();
        assert_eq!(tokens.access_token, "AT1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("RT1"));
        assert_eq!(tokens.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_invalid_grant_is_recognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh_token("RT1").await.unwrap_err();
        assert_eq!(err, GoogleApiError::InvalidGrant("Bad Request".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v1/userinfo"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_userinfo("AT1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v1/userinfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "u1"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = GoogleClient::new(
            "cid".to_string(),
            "secret".to_string(),
            "http://localhost/cb".to_string(),
            GoogleEndpoints::with_base(&server.uri()),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client.get_userinfo("AT1").await.unwrap_err();
        assert!(matches!(err, GoogleApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_connections_request_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/people/me/connections"))
            .and(query_param("pageSize", "25"))
            .and(header("Authorization", "Bearer AT1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "connections": [
                    {"names": [{"displayName": "Ann"}], "emailAddresses": [{"value": "ann@example.com"}]}
                ],
                "nextPageToken": "ignored"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).list_connections("AT1", 25).await.unwrap();
        assert_eq!(page.connections.len(), 1);
        assert_eq!(
            page.connections[0].names[0].display_name.as_deref(),
            Some("Ann")
        );
    }
}
