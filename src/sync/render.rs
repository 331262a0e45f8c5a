//! Rendering desired configuration into the target's entity graph.
//!
//! Each desired entity becomes a wire body with a stable id: the live id when
//! an entity with the same natural key exists, a fresh UUID otherwise. Name
//! references are resolved to `{"id": ...}` objects against the rendered
//! state, so referenced kinds are rendered first.

use reqwest::Url;
use semver::Version;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use tracing::warn;
use uuid::Uuid;

use crate::admin::{Entity, EntityKind};
use crate::config::GatewayConfig;
use crate::error::RenderError;

use super::current::{CurrentState, EntityState};

/// Inputs that shape rendering besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Live state used for id reuse.
    pub current: &'a CurrentState,
    /// Proxy version of the target.
    pub version: &'a Version,
    /// Render CA certificates.
    pub include_ca_certificates: bool,
}

/// Renders `config` into the target entity state.
///
/// # Errors
///
/// Returns an error if a reference cannot be resolved, the live state is
/// ambiguous for a desired entity, or an entity cannot be rendered.
pub fn render_target(
    config: &GatewayConfig,
    ctx: RenderContext<'_>,
) -> std::result::Result<EntityState, RenderError> {
    let mut renderer = Renderer {
        ctx,
        select_tags: config.select_tags(),
        target: EntityState::new(),
    };

    if ctx.include_ca_certificates {
        for cert in &config.ca_certificates {
            renderer.add(EntityKind::CaCertificates, cert, &[])?;
        }
    }
    for service in &config.services {
        let mut body = to_body(EntityKind::Services, &service.name, service)?;
        expand_service_url(&service.name, &mut body)?;
        renderer.add_body(EntityKind::Services, &service.name, body)?;
    }
    for consumer in &config.consumers {
        renderer.add(EntityKind::Consumers, consumer, &[])?;
    }
    for route in &config.routes {
        renderer.add(
            EntityKind::Routes,
            route,
            &[("service", EntityKind::Services)],
        )?;
    }
    for plugin in &config.plugins {
        let mut body = to_body(EntityKind::Plugins, &plugin.scope_label(), plugin)?;
        if body.contains_key("ordering") && ctx.version < &Version::new(3, 0, 0) {
            warn!(
                "Plugin '{}': ordering requires proxy 3.0 or later (target is {}), dropping it",
                plugin.scope_label(),
                ctx.version
            );
            body.remove("ordering");
        }
        renderer.resolve_references(
            EntityKind::Plugins,
            &plugin.scope_label(),
            &mut body,
            &[
                ("service", EntityKind::Services),
                ("route", EntityKind::Routes),
                ("consumer", EntityKind::Consumers),
            ],
        )?;
        renderer.add_body(EntityKind::Plugins, &plugin.scope_label(), body)?;
    }

    Ok(renderer.target)
}

struct Renderer<'a> {
    ctx: RenderContext<'a>,
    select_tags: &'a [String],
    target: EntityState,
}

impl Renderer<'_> {
    fn add<T: Serialize>(
        &mut self,
        kind: EntityKind,
        entity: &T,
        references: &[(&str, EntityKind)],
    ) -> std::result::Result<(), RenderError> {
        let mut body = to_body(kind, "<unnamed>", entity)?;
        let label = kind
            .natural_key(&body)
            .unwrap_or_else(|| String::from("<unnamed>"));
        self.resolve_references(kind, &label, &mut body, references)?;
        self.add_body(kind, &label, body)
    }

    fn resolve_references(
        &self,
        kind: EntityKind,
        label: &str,
        body: &mut Map<String, Value>,
        references: &[(&str, EntityKind)],
    ) -> std::result::Result<(), RenderError> {
        for (field, target_kind) in references {
            let Some(name) = body.get(*field).and_then(Value::as_str).map(String::from) else {
                continue;
            };
            let entity = self.target.get(*target_kind, &name).ok_or_else(|| {
                RenderError::UnresolvedReference {
                    kind: kind.singular().to_string(),
                    name: label.to_string(),
                    target_kind: target_kind.singular().to_string(),
                    target: name.clone(),
                }
            })?;
            body.insert((*field).to_string(), json!({"id": entity.id}));
        }
        Ok(())
    }

    fn add_body(
        &mut self,
        kind: EntityKind,
        label: &str,
        mut body: Map<String, Value>,
    ) -> std::result::Result<(), RenderError> {
        add_select_tags(&mut body, self.select_tags);

        let key = kind
            .natural_key(&body)
            .ok_or_else(|| RenderError::InvalidEntity {
                kind: kind.singular().to_string(),
                key: label.to_string(),
                message: String::from("missing identifying field"),
            })?;

        if let Some(ambiguous) = self.ctx.current.ambiguity(kind, &key) {
            return Err(RenderError::AmbiguousLiveEntity {
                kind: kind.singular().to_string(),
                key,
                count: ambiguous.count,
            });
        }
        if self.target.get(kind, &key).is_some() {
            return Err(RenderError::DuplicateEntity {
                kind: kind.singular().to_string(),
                key,
            });
        }

        let id = self
            .ctx
            .current
            .entities
            .get(kind, &key)
            .map_or_else(|| Uuid::new_v4().to_string(), |live| live.id.clone());
        body.insert(String::from("id"), Value::String(id.clone()));

        self.target.insert(kind, Entity { id, key, body });
        Ok(())
    }
}

fn to_body<T: Serialize>(
    kind: EntityKind,
    label: &str,
    entity: &T,
) -> std::result::Result<Map<String, Value>, RenderError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(body)) => Ok(body),
        Ok(_) => Err(RenderError::InvalidEntity {
            kind: kind.singular().to_string(),
            key: label.to_string(),
            message: String::from("did not serialize to an object"),
        }),
        Err(e) => Err(RenderError::InvalidEntity {
            kind: kind.singular().to_string(),
            key: label.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Replaces a service `url` with the protocol, host, port and path fields the
/// admin API stores.
fn expand_service_url(
    name: &str,
    body: &mut Map<String, Value>,
) -> std::result::Result<(), RenderError> {
    let Some(Value::String(raw)) = body.remove("url") else {
        return Ok(());
    };
    let url = Url::parse(&raw).map_err(|e| RenderError::InvalidEntity {
        kind: String::from("service"),
        key: name.to_string(),
        message: format!("invalid url '{raw}': {e}"),
    })?;
    let host = url.host_str().ok_or_else(|| RenderError::InvalidEntity {
        kind: String::from("service"),
        key: name.to_string(),
        message: format!("url '{raw}' has no host"),
    })?;

    body.insert(String::from("protocol"), json!(url.scheme()));
    body.insert(String::from("host"), json!(host));
    if let Some(port) = url.port_or_known_default() {
        body.insert(String::from("port"), json!(port));
    }
    if url.path() != "/" {
        body.insert(String::from("path"), json!(url.path()));
    }
    Ok(())
}

fn add_select_tags(body: &mut Map<String, Value>, select_tags: &[String]) {
    if select_tags.is_empty() {
        return;
    }
    let mut tags: Vec<String> = body
        .get("tags")
        .and_then(Value::as_array)
        .map(|t| t.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();
    let present: BTreeSet<String> = tags.iter().cloned().collect();
    tags.extend(select_tags.iter().filter(|t| !present.contains(*t)).cloned());
    body.insert(String::from("tags"), json!(tags));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigInfo, PluginConfig, RouteConfig, ServiceConfig};
    use serde_json::json;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::empty();
        config
            .services
            .push(ServiceConfig::new("billing", "https://billing.internal/v1"));
        config
            .routes
            .push(RouteConfig::new("billing-api", "billing", &["/billing"]));
        let mut plugin = PluginConfig::new("key-auth", Map::new());
        plugin.route = Some(String::from("billing-api"));
        plugin.ordering = Some(json!({"before": {"access": ["rate-limiting"]}}));
        config.plugins.push(plugin);
        config
    }

    fn render(
        config: &GatewayConfig,
        current: &CurrentState,
        version: &Version,
    ) -> std::result::Result<EntityState, RenderError> {
        render_target(
            config,
            RenderContext {
                current,
                version,
                include_ca_certificates: true,
            },
        )
    }

    #[test]
    fn test_references_resolve_to_ids() {
        let current = CurrentState::default();
        let target = render(&config(), &current, &Version::new(3, 4, 1)).expect("render");

        let service = target.get(EntityKind::Services, "billing").expect("service");
        let route = target.get(EntityKind::Routes, "billing-api").expect("route");
        assert_eq!(route.body["service"], json!({"id": service.id}));

        let plugin_key = format!("key-auth route={}", route.id);
        let plugin = target.get(EntityKind::Plugins, &plugin_key).expect("plugin");
        assert!(plugin.body.contains_key("ordering"));
    }

    #[test]
    fn test_service_url_is_expanded() {
        let current = CurrentState::default();
        let target = render(&config(), &current, &Version::new(3, 4, 1)).expect("render");
        let body = &target
            .get(EntityKind::Services, "billing")
            .expect("service")
            .body;

        assert!(!body.contains_key("url"));
        assert_eq!(body["protocol"], "https");
        assert_eq!(body["host"], "billing.internal");
        assert_eq!(body["port"], 443);
        assert_eq!(body["path"], "/v1");
    }

    #[test]
    fn test_live_ids_are_reused() {
        let current = CurrentState::from_listings(
            vec![(
                EntityKind::Services,
                vec![json!({"id": "live-svc", "name": "billing"})
                    .as_object()
                    .cloned()
                    .expect("object")],
            )],
            &[],
        );
        let target = render(&config(), &current, &Version::new(3, 4, 1)).expect("render");
        assert_eq!(
            target.get(EntityKind::Services, "billing").expect("service").id,
            "live-svc"
        );
    }

    #[test]
    fn test_ordering_dropped_for_old_proxies() {
        let current = CurrentState::default();
        let target = render(&config(), &current, &Version::new(2, 8, 4)).expect("render");
        let plugin = target
            .entities(EntityKind::Plugins)
            .next()
            .expect("plugin");
        assert!(!plugin.body.contains_key("ordering"));
    }

    #[test]
    fn test_unresolved_reference() {
        let mut config = config();
        config.routes[0].service = Some(String::from("ghost"));

        let err = render(&config, &CurrentState::default(), &Version::new(3, 4, 1)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnresolvedReference { ref target, .. } if target == "ghost"
        ));
    }

    #[test]
    fn test_ambiguous_live_state_fails() {
        let duplicate = |id: &str| {
            json!({"id": id, "name": "billing"})
                .as_object()
                .cloned()
                .expect("object")
        };
        let current = CurrentState::from_listings(
            vec![(EntityKind::Services, vec![duplicate("a"), duplicate("b")])],
            &[],
        );

        let err = render(&config(), &current, &Version::new(3, 4, 1)).unwrap_err();
        assert!(matches!(err, RenderError::AmbiguousLiveEntity { count: 2, .. }));
    }

    #[test]
    fn test_select_tags_are_added() {
        let mut config = config();
        config.info = Some(ConfigInfo {
            select_tags: vec![String::from("managed")],
            ..ConfigInfo::default()
        });
        config.services[0].tags = vec![String::from("team-a")];

        let target = render(&config, &CurrentState::default(), &Version::new(3, 4, 1)).expect("render");
        let tags = &target
            .get(EntityKind::Services, "billing")
            .expect("service")
            .body["tags"];
        assert_eq!(tags, &json!(["team-a", "managed"]));
    }
}
