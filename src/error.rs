//! Error types for the gateway push system.
//!
//! The hierarchy mirrors the lifecycle of a push: loading the desired
//! configuration, talking to an admin API, rendering the target entity
//! graph, persisting the last applied fingerprint. [`PushError`] also carries
//! the structural variants ([`PushError::Conflict`], [`PushError::Multi`],
//! [`PushError::Context`]) that the failure classifier walks.

use std::path::PathBuf;
use thiserror::Error;

use crate::classify::FailureReason;

/// The main error type for the gateway push system.
#[derive(Debug, Error)]
pub enum PushError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Admin API errors.
    #[error("Admin API error: {0}")]
    AdminApi(#[from] AdminApiError),

    /// Target state rendering errors.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Fingerprint store errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// The wrapped failure was likely caused by the live target drifting
    /// while the push was being planned.
    #[error("Configuration conflict: {source}")]
    Conflict {
        /// The underlying failure.
        source: Box<PushError>,
    },

    /// Several independent failures, typically one per sync operation.
    #[error("{} errors occurred: {}", .0.len(), join_errors(.0))]
    Multi(Vec<PushError>),

    /// A failure annotated with what was being attempted.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted.
        context: String,
        /// The underlying failure.
        source: Box<PushError>,
    },

    /// Canonical serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Metrics registration failed.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The caller cancelled the push.
    #[error("Push cancelled")]
    Cancelled,

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Environment variable has an unusable value.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// The admin API reported a version that cannot be parsed.
    #[error("Invalid proxy version: {version}")]
    InvalidVersion {
        /// The version string as reported.
        version: String,
    },
}

/// Classes of transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The request or connection timed out.
    Timeout,
    /// The connection could not be established (DNS, refused).
    Connect,
    /// The connection failed mid-request (reset, broken body).
    Transport,
}

/// Admin API errors.
#[derive(Debug, Error)]
pub enum AdminApiError {
    /// Authentication failed.
    #[error("Admin API authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed with a non-success status.
    #[error("Admin API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with {endpoint} ({kind:?}): {message}")]
    Network {
        /// Failure class.
        kind: NetworkErrorKind,
        /// URL being requested.
        endpoint: String,
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from admin API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The secondary directory has no group with the requested name.
    #[error("Runtime group not found: {name}")]
    GroupNotFound {
        /// Requested group name.
        name: String,
    },
}

/// Failures while rendering desired configuration into target entities.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An entity references another entity that does not exist.
    #[error("{kind} '{name}' references unknown {target_kind} '{target}'")]
    UnresolvedReference {
        /// Kind of the referencing entity.
        kind: String,
        /// Name of the referencing entity.
        name: String,
        /// Kind of the referenced entity.
        target_kind: String,
        /// Name of the referenced entity.
        target: String,
    },

    /// The live state holds several entities with the same natural key.
    #[error("Live state has {count} {kind} entities keyed '{key}'")]
    AmbiguousLiveEntity {
        /// Entity kind.
        kind: String,
        /// Natural key.
        key: String,
        /// Number of entities sharing the key.
        count: usize,
    },

    /// The desired configuration defines the same entity twice.
    #[error("Duplicate {kind} '{key}' in desired configuration")]
    DuplicateEntity {
        /// Entity kind.
        kind: String,
        /// Natural key.
        key: String,
    },

    /// An entity could not be converted to its wire form.
    #[error("Cannot render {kind} '{key}': {message}")]
    InvalidEntity {
        /// Entity kind.
        kind: String,
        /// Natural key.
        key: String,
        /// What went wrong.
        message: String,
    },
}

/// Fingerprint store errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },
}

/// Result type alias for gateway push operations.
pub type Result<T> = std::result::Result<T, PushError>;

fn join_errors(errors: &[PushError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PushError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Marks an error as a conflict-class failure.
    #[must_use]
    pub fn conflict(source: impl Into<Self>) -> Self {
        Self::Conflict {
            source: Box::new(source.into()),
        }
    }

    /// Wraps an error with a description of what was being attempted.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        FailureReason::classify(self)
    }

    /// Returns true if retrying later (possibly after re-rendering) can help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.failure_reason(),
            FailureReason::Network | FailureReason::Conflict
        )
    }
}

/// Extension for attaching context to fallible results.
pub trait ResultExt<T> {
    /// Wraps the error, if any, with `context`.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in [`PushError::Context`].
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<PushError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error for the given source location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl AdminApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(
        kind: NetworkErrorKind,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Network {
            kind,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl StateError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chain_display() {
        let err = PushError::from(AdminApiError::api_error(400, "schema violation"))
            .with_context("upserting service 'billing'");

        assert_eq!(
            err.to_string(),
            "upserting service 'billing': Admin API error: Admin API request failed: 400 - schema violation"
        );
    }

    #[test]
    fn test_multi_display_lists_members() {
        let err = PushError::Multi(vec![
            PushError::internal("first"),
            PushError::internal("second"),
        ]);

        assert_eq!(
            err.to_string(),
            "2 errors occurred: Internal error: first; Internal error: second"
        );
    }

    #[test]
    fn test_result_ext_wraps_foreign_errors() {
        let result: std::result::Result<(), ConfigError> = Err(ConfigError::MissingEnvVar {
            name: String::from("GWPUSH_MIRROR_TOKEN"),
        });

        let err = result.context("building mirror client").unwrap_err();
        assert!(matches!(err, PushError::Context { ref context, .. } if context == "building mirror client"));
    }

    #[test]
    fn test_retryable_follows_classification() {
        let network = PushError::from(AdminApiError::network(
            NetworkErrorKind::Timeout,
            "http://localhost:8001/status",
            "timed out",
        ));
        let conflict = PushError::from(AdminApiError::api_error(409, "exists"));
        let other = PushError::from(AdminApiError::api_error(400, "bad"));

        assert!(network.is_retryable());
        assert!(conflict.is_retryable());
        assert!(!other.is_retryable());
    }
}
