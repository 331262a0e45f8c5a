//! Plan executor for applying sync plans.
//!
//! Stages run in order. Within a stage, operations run concurrently up to the
//! plan's budget. Every failure in a stage is collected; later stages are not
//! started once a stage has failed.

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::admin::AdminClient;
use crate::error::{PushError, Result, ResultExt};

use super::diff::{ChangeType, EntityChange};
use super::plan::{SyncPlan, SyncStage};

/// Executor for sync plans.
#[derive(Debug)]
pub struct SyncExecutor<'a> {
    /// Admin client of the target.
    client: &'a AdminClient,
}

/// Result of executing a plan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Entities created.
    pub created: usize,
    /// Entities updated.
    pub updated: usize,
    /// Entities deleted.
    pub deleted: usize,
    /// Stages completed.
    pub stages: usize,
}

impl<'a> SyncExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(client: &'a AdminClient) -> Self {
        Self { client }
    }

    /// Executes a sync plan.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Multi`] with every failed operation of the first
    /// failing stage.
    pub async fn execute(&self, plan: &SyncPlan) -> Result<SyncReport> {
        info!(
            "Executing sync plan: {} operations in {} stages",
            plan.operation_count(),
            plan.stages.len()
        );

        let mut report = SyncReport::default();

        for stage in &plan.stages {
            let failures = self.execute_stage(stage, plan.concurrency, &mut report).await;
            if !failures.is_empty() {
                error!(
                    "{} of {} operations failed in {} {} stage",
                    failures.len(),
                    stage.changes.len(),
                    stage.phase,
                    stage.kind.path()
                );
                return Err(PushError::Multi(failures));
            }
            report.stages += 1;
        }

        info!(
            "Sync complete: {} created, {} updated, {} deleted",
            report.created, report.updated, report.deleted
        );
        Ok(report)
    }

    async fn execute_stage(
        &self,
        stage: &SyncStage,
        concurrency: usize,
        report: &mut SyncReport,
    ) -> Vec<PushError> {
        debug!(
            "Stage {} {}: {} operations",
            stage.phase,
            stage.kind.path(),
            stage.changes.len()
        );

        // Boxing erases the borrowing future type so the stage future stays `Send`.
        let pending: Vec<BoxFuture<'_, (ChangeType, Result<()>)>> = stage
            .changes
            .iter()
            .map(|change| async move { (change.change, self.apply(change).await) }.boxed())
            .collect();
        let results: Vec<(ChangeType, Result<()>)> = stream::iter(pending)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut failures = Vec::new();
        for (change, result) in results {
            match (change, result) {
                (_, Err(e)) => failures.push(e),
                (ChangeType::Create, Ok(())) => report.created += 1,
                (ChangeType::Update, Ok(())) => report.updated += 1,
                (ChangeType::Delete, Ok(())) => report.deleted += 1,
            }
        }
        failures
    }

    async fn apply(&self, change: &EntityChange) -> Result<()> {
        let entity = &change.entity;
        debug!("Applying {change}");

        let result = match change.change {
            ChangeType::Create | ChangeType::Update => self
                .client
                .upsert_entity(change.kind, &entity.id, &entity.body)
                .await
                .map(|_| ()),
            ChangeType::Delete => self.client.delete_entity(change.kind, &entity.id).await,
        };
        result.context(format!("{} {} '{}'", change.change, change.kind, entity.key))
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted",
            self.created, self.updated, self.deleted
        )
    }
}
