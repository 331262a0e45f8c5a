//! Sync plan types and construction.
//!
//! A plan is a sequence of stages. Upserts run first, referenced kinds before
//! the kinds that reference them; deletes follow in reverse order so nothing
//! is removed while still referenced.

use chrono::{DateTime, Utc};

use crate::admin::EntityKind;

use super::diff::{ChangeType, EntityChange, SyncDiff};

/// Default number of in-flight operations per stage.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Phase of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    /// Creates and updates.
    Upsert,
    /// Deletes.
    Delete,
}

/// A group of independent operations on one entity kind.
#[derive(Debug, Clone)]
pub struct SyncStage {
    /// Entity kind.
    pub kind: EntityKind,
    /// Phase.
    pub phase: StagePhase,
    /// Operations, runnable in any order.
    pub changes: Vec<EntityChange>,
}

/// A complete sync plan.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Stages in execution order.
    pub stages: Vec<SyncStage>,
    /// Maximum in-flight operations per stage.
    pub concurrency: usize,
}

impl SyncPlan {
    /// Builds a plan from a diff.
    #[must_use]
    pub fn from_diff(diff: SyncDiff, concurrency: usize) -> Self {
        let mut upserts: Vec<SyncStage> = Vec::new();
        let mut deletes: Vec<SyncStage> = Vec::new();

        for kind in EntityKind::ALL {
            upserts.push(SyncStage {
                kind,
                phase: StagePhase::Upsert,
                changes: vec![],
            });
            deletes.push(SyncStage {
                kind,
                phase: StagePhase::Delete,
                changes: vec![],
            });
        }

        for change in diff.changes {
            let stages = if change.change == ChangeType::Delete {
                &mut deletes
            } else {
                &mut upserts
            };
            if let Some(stage) = stages.iter_mut().find(|s| s.kind == change.kind) {
                stage.changes.push(change);
            }
        }

        deletes.reverse();
        let stages = upserts
            .into_iter()
            .chain(deletes)
            .filter(|s| !s.changes.is_empty())
            .collect();

        Self {
            created_at: Utc::now(),
            stages,
            concurrency: concurrency.max(1),
        }
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.stages.iter().map(|s| s.changes.len()).sum()
    }

    /// Returns the number of operations of one type.
    #[must_use]
    pub fn count(&self, change: ChangeType) -> usize {
        self.stages
            .iter()
            .flat_map(|s| &s.changes)
            .filter(|c| c.change == change)
            .count()
    }

    /// Iterates every planned change in execution order.
    pub fn changes(&self) -> impl Iterator<Item = &EntityChange> {
        self.stages.iter().flat_map(|s| &s.changes)
    }
}

impl std::fmt::Display for StagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upsert => write!(f, "upsert"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl std::fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.stages.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(
            f,
            "Sync Plan ({} operations, {} stages):",
            self.operation_count(),
            self.stages.len()
        )?;
        for (i, stage) in self.stages.iter().enumerate() {
            writeln!(f, "  {i}. {} {}", stage.phase, stage.kind.path())?;
            for change in &stage.changes {
                writeln!(f, "     - {change}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Entity;
    use serde_json::Map;

    fn change(kind: EntityKind, change: ChangeType, key: &str) -> EntityChange {
        EntityChange {
            kind,
            change,
            entity: Entity {
                id: key.to_string(),
                key: key.to_string(),
                body: Map::new(),
            },
        }
    }

    #[test]
    fn test_stage_order() {
        let diff = SyncDiff {
            changes: vec![
                change(EntityKind::Plugins, ChangeType::Create, "p"),
                change(EntityKind::Services, ChangeType::Delete, "old-svc"),
                change(EntityKind::Routes, ChangeType::Delete, "old-route"),
                change(EntityKind::Services, ChangeType::Update, "svc"),
            ],
            unchanged: 0,
        };

        let plan = SyncPlan::from_diff(diff, 4);
        let order: Vec<_> = plan.stages.iter().map(|s| (s.phase, s.kind)).collect();

        assert_eq!(
            order,
            vec![
                (StagePhase::Upsert, EntityKind::Services),
                (StagePhase::Upsert, EntityKind::Plugins),
                (StagePhase::Delete, EntityKind::Routes),
                (StagePhase::Delete, EntityKind::Services),
            ]
        );
        assert_eq!(plan.operation_count(), 4);
        assert_eq!(plan.count(ChangeType::Delete), 2);
    }

    #[test]
    fn test_empty_plan() {
        let plan = SyncPlan::from_diff(SyncDiff::default(), 0);
        assert!(plan.is_empty());
        assert_eq!(plan.concurrency, 1);
        assert_eq!(plan.to_string(), "No changes required");
    }
}
