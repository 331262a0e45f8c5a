//! Configuration push orchestrator.
//!
//! One call to [`Orchestrator::push`] runs the whole sequence for one
//! snapshot and one target:
//!
//! 1. fingerprint the snapshot,
//! 2. skip if it matches the last applied fingerprint and the target is
//!    alive (unless a full push is forced),
//! 3. deliver with the target's strategy, timed,
//! 4. classify any failure and record telemetry,
//! 5. mirror to the secondary target, if enabled, discarding its result.
//!
//! The orchestrator never retries and never schedules. Callers own the last
//! applied fingerprint and persist the returned one only on success.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::FailureReason;
use crate::config::{DesiredConfiguration, Fingerprint, FingerprintEngine};
use crate::delivery::reconciled::ReconcileOptions;
use crate::delivery::{self, DeliveryProtocol, RuntimeTarget};
use crate::error::{PushError, Result};
use crate::metrics::PushMetrics;
use crate::mirror::SecondaryMirror;

/// Per-call push options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Deliver even when the fingerprint is unchanged.
    pub force_full: bool,
}

/// What a push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    /// The snapshot was delivered.
    Applied,
    /// Nothing was delivered.
    Skipped,
    /// Delivery (or fingerprinting) failed.
    Failed,
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Result of one push.
#[derive(Debug)]
pub struct PushOutcome {
    /// Fingerprint the caller should treat as applied: the new one on
    /// success, the previous one otherwise.
    pub fingerprint: Fingerprint,
    /// What happened.
    pub status: PushStatus,
    /// The failure, if any.
    pub error: Option<PushError>,
    /// Failure class, if failed.
    pub failure_reason: Option<FailureReason>,
    /// Protocol used, if delivery was attempted.
    pub protocol: Option<DeliveryProtocol>,
    /// Time spent delivering (zero when nothing was delivered).
    pub elapsed: Duration,
}

impl PushOutcome {
    fn skipped(last: Fingerprint) -> Self {
        Self {
            fingerprint: last,
            status: PushStatus::Skipped,
            error: None,
            failure_reason: None,
            protocol: None,
            elapsed: Duration::ZERO,
        }
    }

    fn failed(last: Fingerprint, error: PushError, protocol: Option<DeliveryProtocol>) -> Self {
        Self {
            fingerprint: last,
            status: PushStatus::Failed,
            failure_reason: Some(FailureReason::classify(&error)),
            error: Some(error),
            protocol,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns true if the snapshot was delivered.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.status == PushStatus::Applied
    }

    /// Returns true if nothing was delivered and nothing failed.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.status == PushStatus::Skipped
    }

    /// Converts the outcome into the fingerprint to keep, or the failure.
    ///
    /// # Errors
    ///
    /// Returns the push failure.
    pub fn into_result(self) -> Result<Fingerprint> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.fingerprint),
        }
    }
}

/// Remembers the last fingerprint reported as a no-op, so unchanged
/// snapshots are logged once rather than on every cycle.
#[derive(Debug, Default)]
pub struct NoopTracker {
    last_reported: Mutex<Option<Fingerprint>>,
}

impl NoopTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `fingerprint`, returning true if it differs from the last
    /// recorded one.
    pub fn first_observation(&self, fingerprint: Fingerprint) -> bool {
        let mut last = self.last_reported.lock();
        if *last == Some(fingerprint) {
            false
        } else {
            *last = Some(fingerprint);
            true
        }
    }
}

/// Pushes desired configuration snapshots to runtime targets.
#[derive(Debug)]
pub struct Orchestrator {
    engine: FingerprintEngine,
    metrics: PushMetrics,
    noop_tracker: NoopTracker,
    mirror: Option<SecondaryMirror>,
}

impl Orchestrator {
    /// Creates an orchestrator recording into `metrics`.
    #[must_use]
    pub fn new(metrics: PushMetrics) -> Self {
        Self {
            engine: FingerprintEngine::new(),
            metrics,
            noop_tracker: NoopTracker::new(),
            mirror: None,
        }
    }

    /// Enables mirroring to a secondary target.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Option<SecondaryMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    /// Returns the telemetry sink.
    #[must_use]
    pub const fn metrics(&self) -> &PushMetrics {
        &self.metrics
    }

    /// Returns the fingerprint engine.
    #[must_use]
    pub const fn engine(&self) -> &FingerprintEngine {
        &self.engine
    }

    /// Pushes `desired` to `target`.
    ///
    /// `last` is the fingerprint of the last snapshot applied to this target,
    /// or [`Fingerprint::UNSET`]. Never panics or returns early without an
    /// outcome; every failure is carried in [`PushOutcome::error`].
    pub async fn push(
        &self,
        target: &RuntimeTarget,
        desired: &DesiredConfiguration,
        last: Fingerprint,
        options: PushOptions,
        cancel: &CancellationToken,
    ) -> PushOutcome {
        if cancel.is_cancelled() {
            return PushOutcome::failed(last, PushError::Cancelled, None);
        }

        let fingerprint = match self.engine.fingerprint(desired) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                error!("Could not fingerprint configuration: {e}");
                return PushOutcome::failed(last, e, None);
            }
        };

        if !options.force_full && !last.is_unset() && fingerprint == last {
            return self.skip_if_alive(target, fingerprint, last, cancel).await;
        }

        let protocol = target.protocol();
        debug!(
            "Pushing configuration {} to {} via {protocol}",
            fingerprint.short(),
            target.client.base_url()
        );

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PushError::Cancelled),
            result = delivery::deliver(target, desired) => result,
        };
        let elapsed = started.elapsed();

        let reason = result.as_ref().err().map(FailureReason::classify);
        self.metrics
            .record(protocol, reason.map_or(Ok(()), Err), elapsed);

        if let Err(e) = &result {
            if matches!(e, PushError::Cancelled) {
                warn!("Push to {} cancelled", target.client.base_url());
                return PushOutcome {
                    elapsed,
                    ..PushOutcome::failed(last, PushError::Cancelled, Some(protocol))
                };
            }
            error!(
                "Failed pushing configuration to {} ({}): {e}",
                target.client.base_url(),
                reason.unwrap_or(FailureReason::Other)
            );
        } else {
            info!(
                "Successfully applied configuration {} to {} in {} ms",
                fingerprint.short(),
                target.client.base_url(),
                elapsed.as_millis()
            );
        }

        if let Some(mirror) = &self.mirror {
            let mirror_options = ReconcileOptions::from(target);
            tokio::select! {
                biased;
                () = cancel.cancelled() => debug!("Secondary sync cancelled"),
                () = mirror.push(desired, &mirror_options) => {}
            }
        }

        match result {
            Ok(()) => PushOutcome {
                fingerprint,
                status: PushStatus::Applied,
                error: None,
                failure_reason: None,
                protocol: Some(protocol),
                elapsed,
            },
            Err(e) => PushOutcome {
                elapsed,
                ..PushOutcome::failed(last, e, Some(protocol))
            },
        }
    }

    async fn skip_if_alive(
        &self,
        target: &RuntimeTarget,
        fingerprint: Fingerprint,
        last: Fingerprint,
        cancel: &CancellationToken,
    ) -> PushOutcome {
        let liveness = tokio::select! {
            biased;
            () = cancel.cancelled() => return PushOutcome::failed(last, PushError::Cancelled, None),
            status = target.client.status() => status,
        };

        match liveness {
            Err(e) => {
                error!(
                    "Checking {} liveness failed, skipping push: {e}",
                    target.client.base_url()
                );
            }
            Ok(status) => {
                if !status.has_configuration() {
                    debug!(
                        "{} does not report a configuration hash yet",
                        target.client.base_url()
                    );
                }
                if self.noop_tracker.first_observation(fingerprint) {
                    info!(
                        "No configuration change ({}); skipping push to {}",
                        fingerprint.short(),
                        target.client.base_url()
                    );
                }
            }
        }
        PushOutcome::skipped(last)
    }
}
