//! Push telemetry.
//!
//! Two series, one sample each per delivery attempt: an outcome counter and
//! a latency histogram. Skipped pushes are not sampled.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::classify::FailureReason;
use crate::delivery::DeliveryProtocol;
use crate::error::{PushError, Result};

/// Name of the outcome counter.
pub const PUSH_COUNT_METRIC: &str = "gateway_push_config_push_count";
/// Name of the latency histogram.
pub const PUSH_DURATION_METRIC: &str = "gateway_push_config_push_duration_milliseconds";

/// Label carrying `true` or `false`.
pub const LABEL_SUCCESS: &str = "success";
/// Label carrying the delivery protocol.
pub const LABEL_PROTOCOL: &str = "protocol";
/// Label carrying the failure class, empty on success.
pub const LABEL_FAILURE_REASON: &str = "failure_reason";

/// Push outcome and latency metrics.
#[derive(Debug, Clone)]
pub struct PushMetrics {
    registry: Registry,
    /// Pushes by outcome.
    pub push_count: IntCounterVec,
    /// Push latency in milliseconds.
    pub push_duration_milliseconds: HistogramVec,
}

impl PushMetrics {
    /// Creates the metrics and registers them on `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self> {
        let push_count = IntCounterVec::new(
            Opts::new(PUSH_COUNT_METRIC, "Count of configuration pushes to the proxy"),
            &[LABEL_SUCCESS, LABEL_PROTOCOL, LABEL_FAILURE_REASON],
        )?;
        registry.register(Box::new(push_count.clone()))?;

        let push_duration_milliseconds = HistogramVec::new(
            HistogramOpts::new(
                PUSH_DURATION_METRIC,
                "How long it took to push the configuration to the proxy, in milliseconds",
            )
            .buckets(vec![
                10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0,
            ]),
            &[LABEL_SUCCESS, LABEL_PROTOCOL],
        )?;
        registry.register(Box::new(push_duration_milliseconds.clone()))?;

        Ok(Self {
            registry: registry.clone(),
            push_count,
            push_duration_milliseconds,
        })
    }

    /// Creates metrics on a fresh private registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be created.
    pub fn unregistered() -> Result<Self> {
        Self::new(&Registry::new())
    }

    /// Records one delivery attempt.
    pub fn record(
        &self,
        protocol: DeliveryProtocol,
        outcome: std::result::Result<(), FailureReason>,
        elapsed: Duration,
    ) {
        let success = if outcome.is_ok() { "true" } else { "false" };
        let reason = outcome.err().map_or("", FailureReason::as_label);

        self.push_count
            .with_label_values(&[success, protocol.as_label(), reason])
            .inc();
        self.push_duration_milliseconds
            .with_label_values(&[success, protocol.as_label()])
            .observe(elapsed.as_secs_f64() * 1_000.0);
    }

    /// Returns the counter value for one label combination.
    #[must_use]
    pub fn count(
        &self,
        protocol: DeliveryProtocol,
        outcome: std::result::Result<(), FailureReason>,
    ) -> u64 {
        let success = if outcome.is_ok() { "true" } else { "false" };
        let reason = outcome.err().map_or("", FailureReason::as_label);
        self.push_count
            .with_label_values(&[success, protocol.as_label(), reason])
            .get()
    }

    /// Returns the total number of recorded delivery attempts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == PUSH_COUNT_METRIC)
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_counter().get_value())
            .sum::<f64>() as u64
    }

    /// Encodes the registry in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| PushError::Serialization(format!("metrics are not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success_and_failure() {
        let metrics = PushMetrics::unregistered().expect("metrics");

        metrics.record(DeliveryProtocol::Direct, Ok(()), Duration::from_millis(12));
        metrics.record(
            DeliveryProtocol::Reconciled,
            Err(FailureReason::Conflict),
            Duration::from_millis(250),
        );

        assert_eq!(metrics.count(DeliveryProtocol::Direct, Ok(())), 1);
        assert_eq!(
            metrics.count(DeliveryProtocol::Reconciled, Err(FailureReason::Conflict)),
            1
        );
        assert_eq!(
            metrics.count(DeliveryProtocol::Reconciled, Err(FailureReason::Network)),
            0
        );
        assert_eq!(metrics.total(), 2);
    }

    #[test]
    fn test_text_exposition_labels() {
        let metrics = PushMetrics::unregistered().expect("metrics");
        metrics.record(
            DeliveryProtocol::Direct,
            Err(FailureReason::Network),
            Duration::from_millis(5),
        );

        let text = metrics.render_text().expect("render");
        assert!(text.contains(
            r#"gateway_push_config_push_count{failure_reason="network",protocol="direct",success="false"} 1"#
        ));
        assert!(text.contains("gateway_push_config_push_duration_milliseconds_bucket"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        PushMetrics::new(&registry).expect("first");
        assert!(matches!(
            PushMetrics::new(&registry),
            Err(PushError::Metrics(_))
        ));
    }
}
