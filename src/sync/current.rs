//! Live entity state as reported by the admin API.

use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::admin::{AdminClient, Entity, EntityKind};
use crate::error::{Result, ResultExt};

/// Server-managed fields ignored when comparing entities.
const SERVER_FIELDS: &[&str] = &["created_at", "updated_at"];

/// Entities grouped by kind and natural key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    entities: BTreeMap<EntityKind, BTreeMap<String, Entity>>,
}

impl EntityState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity, returning any entity previously stored under the
    /// same natural key.
    pub fn insert(&mut self, kind: EntityKind, entity: Entity) -> Option<Entity> {
        self.entities
            .entry(kind)
            .or_default()
            .insert(entity.key.clone(), entity)
    }

    /// Looks up an entity by natural key.
    #[must_use]
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<&Entity> {
        self.entities.get(&kind)?.get(key)
    }

    /// Iterates the entities of one kind in key order.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.get(&kind).into_iter().flat_map(BTreeMap::values)
    }

    /// Returns the number of entities of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Returns the total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }

    /// Returns true if no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A natural key shared by several live entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousKey {
    /// Entity kind.
    pub kind: EntityKind,
    /// Natural key.
    pub key: String,
    /// Number of live entities sharing it.
    pub count: usize,
}

/// Live state of a target, restricted to the entities this tool manages.
#[derive(Debug, Clone, Default)]
pub struct CurrentState {
    /// Managed live entities.
    pub entities: EntityState,
    /// Natural keys that identify more than one live entity.
    pub ambiguous: Vec<AmbiguousKey>,
}

impl CurrentState {
    /// Returns the ambiguity recorded for a key, if any.
    #[must_use]
    pub fn ambiguity(&self, kind: EntityKind, key: &str) -> Option<&AmbiguousKey> {
        self.ambiguous
            .iter()
            .find(|a| a.kind == kind && a.key == key)
    }

    /// Builds the managed state from raw entity listings.
    #[must_use]
    pub fn from_listings(
        listings: Vec<(EntityKind, Vec<Map<String, Value>>)>,
        select_tags: &[String],
    ) -> Self {
        let mut state = Self::default();
        let mut counts: BTreeMap<(EntityKind, String), usize> = BTreeMap::new();

        for (kind, bodies) in listings {
            for mut body in bodies {
                if !carries_all(&body, select_tags) {
                    continue;
                }

                let Some(id) = body.get("id").and_then(Value::as_str).map(String::from) else {
                    warn!("Ignoring live {kind} without an id");
                    continue;
                };
                let Some(key) = kind.natural_key(&body) else {
                    debug!("Ignoring live {kind} {id}: no natural key");
                    continue;
                };

                for field in SERVER_FIELDS {
                    body.remove(*field);
                }

                *counts.entry((kind, key.clone())).or_default() += 1;
                state.entities.insert(kind, Entity { id, key, body });
            }
        }

        state.ambiguous = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|((kind, key), count)| AmbiguousKey { kind, key, count })
            .collect();
        state
    }
}

/// Options controlling which live entities are read.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Only entities carrying all of these tags are managed.
    pub select_tags: Vec<String>,
    /// Do not read (or manage) CA certificates.
    pub skip_ca_certificates: bool,
}

/// Returns the kinds managed under `options`, in dependency order.
#[must_use]
pub fn managed_kinds(options: &FetchOptions) -> Vec<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .filter(|k| !(options.skip_ca_certificates && *k == EntityKind::CaCertificates))
        .collect()
}

/// Reads the managed live state of a target.
///
/// # Errors
///
/// Returns the first listing failure.
pub async fn fetch_current(client: &AdminClient, options: &FetchOptions) -> Result<CurrentState> {
    let listings = try_join_all(managed_kinds(options).into_iter().map(|kind| async move {
        let bodies = client
            .list_entities(kind)
            .await
            .context(format!("listing {}", kind.path()))?;
        Ok::<_, crate::error::PushError>((kind, bodies))
    }))
    .await?;

    let state = CurrentState::from_listings(listings, &options.select_tags);
    debug!(
        "Fetched {} managed live entities from {}",
        state.entities.len(),
        client.base_url()
    );
    Ok(state)
}

fn carries_all(body: &Map<String, Value>, select_tags: &[String]) -> bool {
    if select_tags.is_empty() {
        return true;
    }
    let tags: Vec<&str> = body
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    select_tags.iter().all(|t| tags.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bodies(values: Vec<Value>) -> Vec<Map<String, Value>> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().expect("object"))
            .collect()
    }

    #[test]
    fn test_from_listings_indexes_by_key() {
        let state = CurrentState::from_listings(
            vec![(
                EntityKind::Services,
                bodies(vec![json!({
                    "id": "s1", "name": "billing", "created_at": 1, "updated_at": 2
                })]),
            )],
            &[],
        );

        let service = state
            .entities
            .get(EntityKind::Services, "billing")
            .expect("service");
        assert_eq!(service.id, "s1");
        assert!(!service.body.contains_key("created_at"));
        assert!(state.ambiguous.is_empty());
    }

    #[test]
    fn test_select_tags_filter_unmanaged() {
        let state = CurrentState::from_listings(
            vec![(
                EntityKind::Routes,
                bodies(vec![
                    json!({"id": "r1", "name": "mine", "tags": ["edge", "team-a"]}),
                    json!({"id": "r2", "name": "theirs", "tags": ["team-a"]}),
                    json!({"id": "r3", "name": "untagged"}),
                ]),
            )],
            &[String::from("edge")],
        );

        assert_eq!(state.entities.count(EntityKind::Routes), 1);
        assert!(state.entities.get(EntityKind::Routes, "mine").is_some());
    }

    #[test]
    fn test_duplicate_live_keys_are_ambiguous() {
        let state = CurrentState::from_listings(
            vec![(
                EntityKind::Consumers,
                bodies(vec![
                    json!({"id": "c1", "username": "app"}),
                    json!({"id": "c2", "username": "app"}),
                ]),
            )],
            &[],
        );

        assert_eq!(
            state.ambiguity(EntityKind::Consumers, "app"),
            Some(&AmbiguousKey {
                kind: EntityKind::Consumers,
                key: String::from("app"),
                count: 2,
            })
        );
    }

    #[test]
    fn test_managed_kinds_skip_ca_certificates() {
        let kinds = managed_kinds(&FetchOptions {
            select_tags: vec![],
            skip_ca_certificates: true,
        });
        assert_eq!(kinds.first(), Some(&EntityKind::Services));
        assert_eq!(kinds.len(), 4);
    }
}
