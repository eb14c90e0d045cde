// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::Session;
use crate::models::{Contact, ContentItem, UserRecord};
use crate::services::CommitSummary;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// API routes (require a session).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sync", post(sync_now))
}

// ─── Dashboard ───────────────────────────────────────────────

/// Everything stored for the current user.
#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserRecord,
    pub contacts: Vec<Contact>,
    pub videos: Vec<ContentItem>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MeResponse>> {
    let subject_id = session.subject_id.as_str();
    tracing::debug!(subject_id, session_id = %session.session_id, "Loading dashboard");

    let user = state
        .store
        .get_user(subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", subject_id)))?;

    let (contacts, videos) = tokio::try_join!(
        state.store.list_contacts(subject_id),
        state.store.list_content_items(subject_id),
    )?;

    Ok(Json(MeResponse {
        user,
        contacts,
        videos,
    }))
}

// ─── Resync ──────────────────────────────────────────────────

/// Re-aggregate with the stored credential.
async fn sync_now(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<CommitSummary>> {
    tracing::info!(
        subject_id = %session.subject_id,
        session_id = %session.session_id,
        "User-initiated resync"
    );
    let summary = state.sync.resync(&session.subject_id).await?;
    Ok(Json(summary))
}
