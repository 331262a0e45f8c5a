// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Gateway Push
//!
//! Idempotent configuration pushes from a control plane to API gateway
//! proxies.
//!
//! ## Overview
//!
//! Each push takes a complete desired snapshot (a declarative gateway
//! document plus an optional overlay of custom entities) and:
//!
//! - Fingerprints it and skips the push when nothing changed
//! - Delivers it with the strategy the target supports
//! - Classifies failures as network, conflict or other
//! - Records outcome and latency metrics
//! - Optionally mirrors it to a secondary control plane
//!
//! ## Architecture
//!
//! Two delivery strategies exist:
//!
//! 1. **Direct-Apply**: DB-less proxies accept the whole document in one
//!    `POST /config`
//! 2. **Reconciled-Apply**: database-backed proxies are driven entity by
//!    entity from a diff of live and desired state
//!
//! ## Modules
//!
//! - [`config`]: Document model, parsing, validation and fingerprints
//! - [`admin`]: Admin API and runtime group directory clients
//! - [`sync`]: Live state fetch, rendering, diff, planning and execution
//! - [`delivery`]: Target description and the two delivery strategies
//! - [`classify`]: Failure classification
//! - [`metrics`]: Push telemetry
//! - [`mirror`]: Secondary control plane mirroring
//! - [`orchestrator`]: The push sequence itself
//! - [`state`]: Last applied fingerprint persistence
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! _format_version: "3.0"
//! _info:
//!   select_tags: [billing-team]
//!
//! services:
//!   - name: billing
//!     url: http://billing.internal:8080
//!
//! routes:
//!   - name: billing-api
//!     service: billing
//!     paths: [/billing]
//!
//! plugins:
//!   - name: rate-limiting
//!     service: billing
//!     config:
//!       minute: 120
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod admin;
pub mod classify;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod metrics;
pub mod mirror;
pub mod orchestrator;
pub mod state;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use admin::{AdminClient, DirectoryClient};
pub use classify::FailureReason;
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{
    ConfigParser, ConfigValidator, DesiredConfiguration, Fingerprint, FingerprintEngine,
    GatewayConfig, MirrorSettings,
};
pub use delivery::{DeliveryProtocol, RuntimeTarget, TargetMode};
pub use error::{PushError, Result};
pub use metrics::PushMetrics;
pub use mirror::SecondaryMirror;
pub use orchestrator::{NoopTracker, Orchestrator, PushOptions, PushOutcome, PushStatus};
pub use state::{FingerprintRecord, FingerprintStore, LocalFingerprintStore};
pub use sync::{SyncExecutor, SyncPlan, SyncReport};
