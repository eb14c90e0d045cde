// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile sync: the authorization callback and on-demand resync.

use crate::error::SyncError;
use crate::models::{Credential, Identity};
use crate::services::aggregator::ProfileAggregator;
use crate::services::scopes::ScopeRegistry;
use crate::services::snapshot::{CommitSummary, SnapshotUpserter};
use crate::services::token::TokenExchanger;

/// Runs exchange or refresh, then aggregation, then commit.
#[derive(Clone)]
pub struct ProfileSyncService {
    exchanger: TokenExchanger,
    aggregator: ProfileAggregator,
    upserter: SnapshotUpserter,
    /// Mapping used to build each pass's registry from granted scopes.
    registry: ScopeRegistry,
}

impl ProfileSyncService {
    pub fn new(
        exchanger: TokenExchanger,
        aggregator: ProfileAggregator,
        upserter: SnapshotUpserter,
        registry: ScopeRegistry,
    ) -> Self {
        Self {
            exchanger,
            aggregator,
            upserter,
            registry,
        }
    }

    pub fn exchanger(&self) -> &TokenExchanger {
        &self.exchanger
    }

    /// Finish the authorization-code flow for `code`.
    ///
    /// Nothing is persisted unless the exchange and the identity fetch both
    /// succeed.
    pub async fn complete_authorization(&self, code: &str) -> Result<Identity, SyncError> {
        let credential = self.exchanger.exchange(code).await?;
        let (identity, _) = self.aggregate_and_commit(credential).await?;
        tracing::info!(subject_id = %identity.subject_id, "Authorization completed");
        Ok(identity)
    }

    /// Re-aggregate a known subject with its stored credential.
    ///
    /// `Refresh(NoRefreshToken)` and `Refresh(Revoked)` mean the user has to
    /// authorize again.
    pub async fn resync(&self, subject_id: &str) -> Result<CommitSummary, SyncError> {
        let credential = self.exchanger.valid_credential(subject_id).await?;
        let (identity, summary) = self.aggregate_and_commit(credential).await?;

        if identity.subject_id != subject_id {
            tracing::warn!(
                subject_id,
                reported = %identity.subject_id,
                "Stored credential belongs to a different subject"
            );
        }
        Ok(summary)
    }

    async fn aggregate_and_commit(
        &self,
        credential: Credential,
    ) -> Result<(Identity, CommitSummary), SyncError> {
        let registry = self
            .registry
            .with_granted(credential.granted_scopes.iter().cloned());

        let profile = self.aggregator.aggregate(&credential, &registry).await?;

        let summary = self
            .upserter
            .commit(
                &profile.identity,
                credential,
                &profile.facets,
                &profile.contacts,
                &profile.content_items,
            )
            .await?;

        Ok((profile.identity, summary))
    }
}
