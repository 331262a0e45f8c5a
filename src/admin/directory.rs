//! Secondary control-plane directory.
//!
//! The secondary control plane hosts one admin surface per runtime group.
//! Groups are addressed by id, so the configured group name is resolved
//! through the bearer-authenticated directory listing first.

use serde::Deserialize;
use tracing::debug;

use crate::error::{AdminApiError, Result};

use super::client::AdminClient;

/// Path of the runtime group directory below the secondary address.
pub const RUNTIME_GROUPS_PATH: &str = "konnect-api/api/runtime_groups";

/// A runtime group as listed by the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeGroup {
    /// Group id.
    pub id: String,
    /// Group name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GroupList {
    #[serde(default)]
    data: Vec<RuntimeGroup>,
}

/// Client for the secondary control-plane directory.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    address: String,
    token: String,
    timeout_secs: u64,
    client: AdminClient,
}

impl DirectoryClient {
    /// Creates a directory client for `address`, authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(address: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let address = address.trim_end_matches('/').to_string();
        let client = AdminClient::with_timeout(&address, timeout_secs)?.with_bearer_token(token)?;
        Ok(Self {
            address,
            token: token.to_string(),
            timeout_secs,
            client,
        })
    }

    /// Lists every runtime group visible to the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn list_groups(&self) -> Result<Vec<RuntimeGroup>> {
        let list: GroupList = self.client.get_json(RUNTIME_GROUPS_PATH).await?;
        Ok(list.data)
    }

    /// Resolves a runtime group name to its id.
    ///
    /// # Errors
    ///
    /// Returns [`AdminApiError::GroupNotFound`] if no group has that name, or
    /// the listing error.
    pub async fn resolve_group_id(&self, name: &str) -> Result<String> {
        let group = self
            .list_groups()
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .ok_or_else(|| AdminApiError::GroupNotFound {
                name: name.to_string(),
            })?;

        debug!("Resolved runtime group '{name}' to {}", group.id);
        Ok(group.id)
    }

    /// Builds an admin client for the group with the given id.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn group_client(&self, group_id: &str) -> Result<AdminClient> {
        AdminClient::with_timeout(
            format!("{}/{RUNTIME_GROUPS_PATH}/{group_id}", self.address),
            self.timeout_secs,
        )?
        .with_bearer_token(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PushError;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn directory(server: &MockServer) -> DirectoryClient {
        Mock::given(method("GET"))
            .and(path("/konnect-api/api/runtime_groups"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "rg-1", "name": "default"},
                    {"id": "rg-2", "name": "edge"}
                ]
            })))
            .mount(server)
            .await;
        DirectoryClient::new(&server.uri(), "tok", 5).expect("directory")
    }

    #[tokio::test]
    async fn test_resolve_group_id() {
        let server = MockServer::start().await;
        let directory = directory(&server).await;

        assert_eq!(directory.resolve_group_id("edge").await.expect("id"), "rg-2");
    }

    #[tokio::test]
    async fn test_group_not_found() {
        let server = MockServer::start().await;
        let directory = directory(&server).await;

        let err = directory.resolve_group_id("missing").await.unwrap_err();
        assert!(matches!(
            err,
            PushError::AdminApi(AdminApiError::GroupNotFound { ref name }) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn test_group_client_address() {
        let server = MockServer::start().await;
        let directory = directory(&server).await;

        let client = directory.group_client("rg-2").expect("client");
        assert_eq!(
            client.base_url(),
            format!("{}/konnect-api/api/runtime_groups/rg-2", server.uri())
        );
    }
}
