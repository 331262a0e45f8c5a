//! Reconciled-apply engine.
//!
//! This module reads a target's live entities, renders the desired document
//! into the target's entity graph, diffs the two and applies the resulting
//! plan through the admin API.

mod current;
mod diff;
mod executor;
mod plan;
mod render;

pub use current::{
    AmbiguousKey, CurrentState, EntityState, FetchOptions, fetch_current, managed_kinds,
};
pub use diff::{ChangeType, EntityChange, SyncDiff, compute_diff};
pub use executor::{SyncExecutor, SyncReport};
pub use plan::{DEFAULT_CONCURRENCY, StagePhase, SyncPlan, SyncStage};
pub use render::{RenderContext, render_target};
