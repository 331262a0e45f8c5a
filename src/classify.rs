//! Failure classification for push outcomes.
//!
//! Every failed delivery is labelled with exactly one [`FailureReason`].
//! Network failures are detected first, then conflicts; anything else is
//! [`FailureReason::Other`]. Both checks walk context wrappers, conflict
//! markers and aggregates to any depth.

use serde::Serialize;

use crate::error::{AdminApiError, PushError};

/// HTTP status the admin API uses for conflicting writes.
const HTTP_CONFLICT: u16 = 409;

/// Why a push failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// A transport-level failure: DNS, refused or reset connection, timeout.
    Network,
    /// The target changed underneath the push, or rejected it as conflicting.
    Conflict,
    /// Any other failure.
    Other,
}

impl FailureReason {
    /// Classifies an error returned by a delivery strategy.
    #[must_use]
    pub fn classify(err: &PushError) -> Self {
        if contains_network_error(err) {
            return Self::Network;
        }

        if is_conflict(err) {
            return Self::Conflict;
        }

        Self::Other
    }

    /// Returns the metric label for this reason.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Conflict => "conflict",
            Self::Other => "other",
        }
    }
}

fn contains_network_error(err: &PushError) -> bool {
    match err {
        PushError::AdminApi(AdminApiError::Network { .. }) => true,
        PushError::Conflict { source } | PushError::Context { source, .. } => {
            contains_network_error(source)
        }
        PushError::Multi(errors) => errors.iter().any(contains_network_error),
        _ => false,
    }
}

fn is_conflict(err: &PushError) -> bool {
    match err {
        PushError::Conflict { .. } => true,
        PushError::AdminApi(api) => api.status() == Some(HTTP_CONFLICT),
        PushError::Context { source, .. } => is_conflict(source),
        PushError::Multi(errors) => errors.iter().any(is_conflict),
        _ => false,
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, NetworkErrorKind, RenderError};

    fn network() -> PushError {
        AdminApiError::network(
            NetworkErrorKind::Timeout,
            "http://localhost:8001/services",
            "operation timed out",
        )
        .into()
    }

    fn upstream_conflict() -> PushError {
        AdminApiError::api_error(409, "UNIQUE violation detected on '{name=\"billing\"}'").into()
    }

    fn other() -> PushError {
        AdminApiError::api_error(400, "schema violation").into()
    }

    #[test]
    fn test_wrapped_timeout_is_network() {
        let err = network()
            .with_context("listing services")
            .with_context("fetching current state");
        assert_eq!(FailureReason::classify(&err), FailureReason::Network);
    }

    #[test]
    fn test_wrapped_409_is_conflict() {
        let err = upstream_conflict().with_context("upserting service 'billing'");
        assert_eq!(FailureReason::classify(&err), FailureReason::Conflict);
    }

    #[test]
    fn test_render_marker_is_conflict() {
        let err = PushError::conflict(RenderError::AmbiguousLiveEntity {
            kind: String::from("services"),
            key: String::from("billing"),
            count: 2,
        });
        assert_eq!(FailureReason::classify(&err), FailureReason::Conflict);
    }

    #[test]
    fn test_aggregate_precedence() {
        let network_other = PushError::Multi(vec![other(), network()]);
        let conflict_other = PushError::Multi(vec![other(), upstream_conflict()]);
        let other_other = PushError::Multi(vec![other(), other()]);
        let network_conflict = PushError::Multi(vec![upstream_conflict(), network()]);

        assert_eq!(FailureReason::classify(&network_other), FailureReason::Network);
        assert_eq!(FailureReason::classify(&conflict_other), FailureReason::Conflict);
        assert_eq!(FailureReason::classify(&other_other), FailureReason::Other);
        assert_eq!(FailureReason::classify(&network_conflict), FailureReason::Network);
    }

    #[test]
    fn test_nested_aggregates_are_searched() {
        let err = PushError::Multi(vec![
            other(),
            PushError::Multi(vec![other(), upstream_conflict().with_context("deleting route")])
                .with_context("stage 2"),
        ]);
        assert_eq!(FailureReason::classify(&err), FailureReason::Conflict);
    }

    #[test]
    fn test_network_inside_conflict_marker_is_network() {
        let err = PushError::conflict(network());
        assert_eq!(FailureReason::classify(&err), FailureReason::Network);
    }

    #[test]
    fn test_unrelated_errors_are_other() {
        let config = PushError::from(ConfigError::MissingEnvVar {
            name: String::from("GWPUSH_ADMIN_URL"),
        });
        assert_eq!(FailureReason::classify(&config), FailureReason::Other);
        assert_eq!(FailureReason::classify(&PushError::Cancelled), FailureReason::Other);
        assert_eq!(
            FailureReason::classify(&PushError::Serialization(String::from("bad float"))),
            FailureReason::Other
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(FailureReason::Network.as_label(), "network");
        assert_eq!(FailureReason::Conflict.to_string(), "conflict");
        assert_eq!(FailureReason::Other.as_label(), "other");
    }
}
