// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hive Social: Google account linking and profile aggregation
//!
//! This crate provides the backend API that takes a user through Google's
//! OAuth consent flow, keeps their credential fresh, and stores a snapshot of
//! whatever profile data, contacts and liked videos they agreed to share.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{CredentialStore, SnapshotStore};
use services::google::GoogleApiError;
use services::{
    GoogleClient, GoogleEndpoints, ProfileAggregator, ProfileSyncService, ScopeRegistry,
    SnapshotUpserter, TokenExchanger,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SnapshotStore>,
    pub google: GoogleClient,
    /// Static capability mapping; nothing granted
    pub registry: ScopeRegistry,
    pub sync: ProfileSyncService,
}

impl AppState {
    /// Wire up the Google client and the sync pipeline over `store`.
    pub fn new<S>(
        config: Config,
        store: S,
        endpoints: GoogleEndpoints,
    ) -> Result<Self, GoogleApiError>
    where
        S: SnapshotStore + 'static,
    {
        let store = Arc::new(store);
        let credentials: Arc<dyn CredentialStore> = store.clone();
        let store: Arc<dyn SnapshotStore> = store;

        let google = GoogleClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.google_redirect_uri.clone(),
            endpoints,
            config.http_timeout,
        )?;
        let registry = ScopeRegistry::google();

        let exchanger = TokenExchanger::new(google.clone(), credentials, registry.clone());
        let aggregator = ProfileAggregator::new(
            google.clone(),
            config.facet_concurrency,
            config.contacts_page_size,
            config.videos_page_size,
        );
        let upserter = SnapshotUpserter::new(store.clone());
        let sync = ProfileSyncService::new(exchanger, aggregator, upserter, registry.clone());

        Ok(Self {
            config,
            store,
            google,
            registry,
            sync,
        })
    }
}
