//! Direct-Apply: post the whole declarative document in one request.

use tracing::debug;

use crate::admin::AdminClient;
use crate::config::{DesiredConfiguration, render_direct_body};
use crate::error::Result;

/// Posts `desired` to the target's configuration endpoint.
///
/// # Errors
///
/// Returns an error if the document cannot be rendered, or the request fails
/// or is rejected.
pub async fn apply(client: &AdminClient, desired: &DesiredConfiguration) -> Result<()> {
    let body = render_direct_body(desired)?;
    debug!("Direct-Apply document is {} bytes", body.len());
    client.post_config(body, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, ServiceConfig};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_merged_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config"))
            .and(query_param("check_hash", "1"))
            .and(body_json(json!({
                "_format_version": "3.0",
                "services": [{"name": "billing", "url": "http://billing:8080"}],
                "vaults": [{"prefix": "env"}]
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut core = GatewayConfig::empty();
        core.services
            .push(ServiceConfig::new("billing", "http://billing:8080"));
        let desired = DesiredConfiguration::new(core)
            .with_overlay(br#"{"vaults": [{"prefix": "env"}]}"#.to_vec());

        let client = AdminClient::new(server.uri()).expect("client");
        apply(&client, &desired).await.expect("apply");
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "declarative config is invalid"})),
            )
            .mount(&server)
            .await;

        let client = AdminClient::new(server.uri()).expect("client");
        let err = apply(&client, &DesiredConfiguration::new(GatewayConfig::empty()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("declarative config is invalid"));
    }
}
