// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hive Social API Server
//!
//! Links Google accounts via OAuth and keeps a snapshot of each user's
//! shared profile, contacts and liked videos.

use hive_social::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryDb},
    services::{GoogleEndpoints, KmsService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting Hive Social API"
    );

    let endpoints = GoogleEndpoints::production();
    let state = match config.storage_backend {
        StorageBackend::Firestore => {
            let kms = KmsService::new(
                &config.gcp_project_id,
                &config.gcp_region,
                "token-encryption",
            )
            .await
            .expect("Failed to initialize KMS service");
            tracing::info!("KMS service initialized");

            let db = FirestoreDb::new(&config.gcp_project_id, kms)
                .await
                .expect("Failed to connect to Firestore");
            AppState::new(config.clone(), db, endpoints)?
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            AppState::new(config.clone(), MemoryDb::new(), endpoints)?
        }
    };

    // Build router
    let app = hive_social::routes::create_router(Arc::new(state));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hive_social=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
