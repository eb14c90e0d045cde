// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod google;
pub mod kms;
pub mod scopes;
pub mod snapshot;
pub mod sync;
pub mod token;

pub use aggregator::{AggregatedProfile, ProfileAggregator};
pub use google::{GoogleClient, GoogleEndpoints};
pub use kms::KmsService;
pub use scopes::{Capability, ScopeRegistry};
pub use snapshot::{CommitSummary, SnapshotUpserter};
pub use sync::ProfileSyncService;
pub use token::TokenExchanger;
