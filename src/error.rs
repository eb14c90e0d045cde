// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the credential lifecycle and consistent API responses.
//!
//! The domain errors (`ExchangeError`, `RefreshError`, `AggregationError`,
//! `PersistError`) are what the core returns. `AppError` is the HTTP-facing
//! wrapper that maps them onto status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure turning an authorization code into a credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// The code was invalid, expired or already used. Terminal.
    #[error("Authorization code rejected: {0}")]
    InvalidGrant(String),

    /// Network error, timeout or provider-side failure. Safe to retry.
    #[error("Token exchange failed transiently: {0}")]
    Transient(String),
}

/// Failure renewing an access token from a stored refresh token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("No refresh token stored for subject")]
    NoRefreshToken,

    /// The provider no longer accepts the refresh token. Terminal; the user
    /// has to go through the authorization-code flow again.
    #[error("Refresh token revoked: {0}")]
    Revoked(String),

    #[error("Token refresh failed transiently: {0}")]
    Transient(String),

    #[error(transparent)]
    Store(#[from] PersistError),
}

/// Fatal aggregation failure. Per-facet failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("Identity fetch failed: {0}")]
    IdentityFetchFailed(String),
}

/// Storage failure. Surfaced to the caller as-is; writes are not retried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a full authorize-or-resync pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Reauthorization required: {0}")]
    ReauthorizationRequired(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Google API error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::InvalidGrant(msg) => AppError::AuthenticationFailed(msg),
            ExchangeError::Transient(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoRefreshToken => {
                AppError::ReauthorizationRequired("no refresh token stored".to_string())
            }
            RefreshError::Revoked(msg) => AppError::ReauthorizationRequired(msg),
            RefreshError::Transient(msg) => AppError::Upstream(msg),
            RefreshError::Store(e) => e.into(),
        }
    }
}

impl From<AggregationError> for AppError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::IdentityFetchFailed(msg) => AppError::AuthenticationFailed(msg),
        }
    }
}

impl From<PersistError> for AppError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Unavailable(msg) => AppError::Database(msg),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Exchange(e) => e.into(),
            SyncError::Refresh(e) => e.into(),
            SyncError::Aggregation(e) => e.into(),
            SyncError::Persist(e) => e.into(),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::AuthenticationFailed(msg) => {
                tracing::warn!(error = %msg, "Authentication failed");
                (StatusCode::UNAUTHORIZED, "authentication_failed", None)
            }
            AppError::ReauthorizationRequired(msg) => {
                tracing::info!(reason = %msg, "Credential unusable, reauthorization required");
                (StatusCode::UNAUTHORIZED, "reauthorization_required", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Google API error");
                (StatusCode::BAD_GATEWAY, "upstream_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
