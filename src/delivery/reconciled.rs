//! Reconciled-Apply: fetch live state, render, diff and apply a plan.

use semver::Version;
use tracing::{debug, info};

use crate::admin::AdminClient;
use crate::config::{DesiredConfiguration, GatewayConfig};
use crate::error::{PushError, Result};
use crate::sync::{
    FetchOptions, RenderContext, SyncExecutor, SyncPlan, SyncReport, compute_diff, fetch_current,
    managed_kinds, render_target,
};

use super::RuntimeTarget;

/// Target properties that shape a reconciled sync.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum in-flight operations per stage.
    pub concurrency: usize,
    /// Proxy version.
    pub version: Version,
    /// Leave CA certificates unmanaged.
    pub skip_ca_certificates: bool,
}

impl From<&RuntimeTarget> for ReconcileOptions {
    fn from(target: &RuntimeTarget) -> Self {
        Self {
            concurrency: target.concurrency,
            version: target.version.clone(),
            skip_ca_certificates: target.skip_ca_certificates,
        }
    }
}

/// Computes the plan that would bring the target in line with `core`.
///
/// # Errors
///
/// Returns listing failures as-is and rendering failures as
/// [`PushError::Conflict`], since they stem from the live state.
pub async fn build_plan(
    client: &AdminClient,
    core: &GatewayConfig,
    options: &ReconcileOptions,
) -> Result<SyncPlan> {
    let fetch = FetchOptions {
        select_tags: core.select_tags().to_vec(),
        skip_ca_certificates: options.skip_ca_certificates,
    };
    let current = fetch_current(client, &fetch).await?;

    let target = render_target(
        core,
        RenderContext {
            current: &current,
            version: &options.version,
            include_ca_certificates: !options.skip_ca_certificates,
        },
    )
    .map_err(PushError::conflict)?;

    let diff = compute_diff(&current.entities, &target, &managed_kinds(&fetch));
    Ok(SyncPlan::from_diff(diff, options.concurrency))
}

/// Syncs `desired` to the target entity by entity.
///
/// # Errors
///
/// Returns planning failures (see [`build_plan`]) or
/// [`PushError::Multi`] with every failed operation.
pub async fn apply(
    client: &AdminClient,
    desired: &DesiredConfiguration,
    options: &ReconcileOptions,
) -> Result<SyncReport> {
    if desired.overlay.is_some() {
        debug!("Custom entities are not applied by Reconciled-Apply");
    }

    let plan = build_plan(client, &desired.core, options).await?;
    if plan.is_empty() {
        info!("{} is already in sync", client.base_url());
        return Ok(SyncReport::default());
    }

    SyncExecutor::new(client).execute(&plan).await
}
