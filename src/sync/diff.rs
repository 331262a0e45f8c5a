//! Diff between live and target entity state.

use serde_json::{Map, Value};
use tracing::debug;

use crate::admin::{Entity, EntityKind};

use super::current::EntityState;

/// Type of change for a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Entity needs to be created.
    Create,
    /// Entity exists but differs.
    Update,
    /// Entity is live but no longer desired.
    Delete,
}

/// A change to a single entity.
#[derive(Debug, Clone)]
pub struct EntityChange {
    /// Entity kind.
    pub kind: EntityKind,
    /// Type of change.
    pub change: ChangeType,
    /// The entity: target state for creates and updates, live state for
    /// deletes.
    pub entity: Entity,
}

/// Complete diff result.
#[derive(Debug, Default)]
pub struct SyncDiff {
    /// All changes, grouped by kind in dependency order.
    pub changes: Vec<EntityChange>,
    /// Number of unchanged entities.
    pub unchanged: usize,
}

/// Computes the changes that turn `current` into `target` for `kinds`.
#[must_use]
pub fn compute_diff(current: &EntityState, target: &EntityState, kinds: &[EntityKind]) -> SyncDiff {
    let mut diff = SyncDiff::default();

    for &kind in kinds {
        for desired in target.entities(kind) {
            match current.get(kind, &desired.key) {
                None => diff.push(kind, ChangeType::Create, desired),
                Some(live)
                    if live.id != desired.id
                        || !is_subset(&desired.body, &live.body)
                        || has_removed_fields(kind, &desired.body, &live.body) =>
                {
                    diff.push(kind, ChangeType::Update, desired);
                }
                Some(_) => diff.unchanged += 1,
            }
        }

        for live in current.entities(kind) {
            if target.get(kind, &live.key).is_none() {
                diff.push(kind, ChangeType::Delete, live);
            }
        }
    }

    debug!(
        "Diff: {} creates, {} updates, {} deletes, {} unchanged",
        diff.count(ChangeType::Create),
        diff.count(ChangeType::Update),
        diff.count(ChangeType::Delete),
        diff.unchanged
    );
    diff
}

impl SyncDiff {
    fn push(&mut self, kind: EntityKind, change: ChangeType, entity: &Entity) {
        self.changes.push(EntityChange {
            kind,
            change,
            entity: entity.clone(),
        });
    }

    /// Returns the number of changes of one type.
    #[must_use]
    pub fn count(&self, change: ChangeType) -> usize {
        self.changes.iter().filter(|c| c.change == change).count()
    }

    /// Returns true if nothing needs to change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Returns true if every field of `desired` has the same value in `live`.
///
/// Objects are compared recursively so server-filled defaults (plugin
/// configuration in particular) do not register as drift.
fn is_subset(desired: &Map<String, Value>, live: &Map<String, Value>) -> bool {
    desired.iter().all(|(key, value)| match (value, live.get(key)) {
        (Value::Object(d), Some(Value::Object(l))) => is_subset(d, l),
        (value, Some(other)) => value == other,
        (_, None) => false,
    })
}

/// Returns true if `live` still carries an owned field that `desired` dropped.
fn has_removed_fields(
    kind: EntityKind,
    desired: &Map<String, Value>,
    live: &Map<String, Value>,
) -> bool {
    kind.owned_fields().iter().any(|field| {
        !desired.contains_key(*field)
            && live.get(*field).is_some_and(|value| match value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
                Value::Bool(_) | Value::Number(_) => true,
            })
    })
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for EntityChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} '{}'", self.change, self.kind, self.entity.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str, key: &str, body: Value) -> Entity {
        Entity {
            id: id.to_string(),
            key: key.to_string(),
            body: body.as_object().cloned().expect("object"),
        }
    }

    fn state(kind: EntityKind, entities: Vec<Entity>) -> EntityState {
        let mut state = EntityState::new();
        for e in entities {
            state.insert(kind, e);
        }
        state
    }

    #[test]
    fn test_create_update_delete() {
        let kind = EntityKind::Routes;
        let current = state(
            kind,
            vec![
                entity("1", "same", json!({"id": "1", "name": "same", "paths": ["/a"]})),
                entity("2", "changed", json!({"id": "2", "name": "changed", "paths": ["/b"]})),
                entity("3", "gone", json!({"id": "3", "name": "gone"})),
            ],
        );
        let target = state(
            kind,
            vec![
                entity("1", "same", json!({"id": "1", "name": "same", "paths": ["/a"]})),
                entity("2", "changed", json!({"id": "2", "name": "changed", "paths": ["/c"]})),
                entity("4", "new", json!({"id": "4", "name": "new"})),
            ],
        );

        let diff = compute_diff(&current, &target, &[kind]);

        assert_eq!(diff.count(ChangeType::Create), 1);
        assert_eq!(diff.count(ChangeType::Update), 1);
        assert_eq!(diff.count(ChangeType::Delete), 1);
        assert_eq!(diff.unchanged, 1);
        let deleted = diff
            .changes
            .iter()
            .find(|c| c.change == ChangeType::Delete)
            .expect("delete");
        assert_eq!(deleted.entity.id, "3");
    }

    #[test]
    fn test_server_defaults_are_not_drift() {
        let kind = EntityKind::Plugins;
        let current = state(
            kind,
            vec![entity(
                "p",
                "rate-limiting",
                json!({
                    "id": "p",
                    "name": "rate-limiting",
                    "enabled": true,
                    "config": {"minute": 20, "policy": "local", "fault_tolerant": true}
                }),
            )],
        );
        let target = state(
            kind,
            vec![entity(
                "p",
                "rate-limiting",
                json!({"id": "p", "name": "rate-limiting", "config": {"minute": 20}}),
            )],
        );

        assert!(compute_diff(&current, &target, &[kind]).is_empty());
    }

    #[test]
    fn test_removed_field_is_drift() {
        let kind = EntityKind::Routes;
        let current = state(
            kind,
            vec![entity(
                "r",
                "api",
                json!({"id": "r", "name": "api", "paths": ["/a"], "hosts": ["x.example"], "snis": null}),
            )],
        );
        let target = state(
            kind,
            vec![entity(
                "r",
                "api",
                json!({"id": "r", "name": "api", "hosts": ["x.example"]}),
            )],
        );

        let diff = compute_diff(&current, &target, &[kind]);
        assert_eq!(diff.count(ChangeType::Update), 1);
        assert_eq!(diff.unchanged, 0);
    }

    #[test]
    fn test_empty_owned_fields_are_not_drift() {
        let kind = EntityKind::Services;
        let current = state(
            kind,
            vec![entity(
                "s",
                "billing",
                json!({"id": "s", "name": "billing", "path": null, "tags": [], "retries": 5}),
            )],
        );
        let target = state(
            kind,
            vec![entity("s", "billing", json!({"id": "s", "name": "billing"}))],
        );

        assert!(compute_diff(&current, &target, &[kind]).is_empty());
    }

    #[test]
    fn test_kinds_outside_scope_are_ignored() {
        let current = state(
            EntityKind::CaCertificates,
            vec![entity("c", "digest", json!({"id": "c", "cert": "PEM"}))],
        );
        let diff = compute_diff(&current, &EntityState::new(), &[EntityKind::Services]);
        assert!(diff.is_empty());
    }
}
