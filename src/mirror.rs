//! Secondary control-plane mirroring.
//!
//! When enabled, every delivered snapshot is also synced to one runtime
//! group of a secondary control plane. Mirroring is best effort: failures
//! are logged and never reach the push outcome, classification or metrics.

use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::admin::{AdminClient, DEFAULT_TIMEOUT_SECS, DirectoryClient};
use crate::config::{DesiredConfiguration, MirrorSettings};
use crate::delivery::reconciled::{self, ReconcileOptions};
use crate::error::{Result, ResultExt};
use crate::sync::SyncReport;

/// Mirrors pushes to a secondary control plane.
#[derive(Debug)]
pub struct SecondaryMirror {
    settings: MirrorSettings,
    timeout_secs: u64,
    /// Group admin client, resolved on first successful lookup.
    client: OnceCell<AdminClient>,
}

impl SecondaryMirror {
    /// Creates a mirror from settings. Nothing is resolved until the first
    /// push.
    #[must_use]
    pub fn new(settings: MirrorSettings) -> Self {
        Self {
            settings,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client: OnceCell::new(),
        }
    }

    /// Creates a mirror if the settings enable one.
    #[must_use]
    pub fn from_settings(settings: MirrorSettings) -> Option<Self> {
        settings.enabled.then(|| Self::new(settings))
    }

    /// Sets the request timeout for secondary calls.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Returns the mirror settings.
    #[must_use]
    pub const fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Returns true once the group has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.client.initialized()
    }

    async fn client(&self) -> Result<&AdminClient> {
        self.client
            .get_or_try_init(|| async {
                let token = self.settings.require_token()?;
                let directory =
                    DirectoryClient::new(&self.settings.address, token, self.timeout_secs)?;
                let group_id = directory
                    .resolve_group_id(&self.settings.group_name)
                    .await?;
                info!(
                    "Mirroring to runtime group '{}' ({group_id})",
                    self.settings.group_name
                );
                directory.group_client(&group_id)
            })
            .await
    }

    /// Syncs `desired` to the secondary target.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be resolved or the sync fails.
    pub async fn try_push(
        &self,
        desired: &DesiredConfiguration,
        options: &ReconcileOptions,
    ) -> Result<SyncReport> {
        let client = self
            .client()
            .await
            .context("resolving secondary runtime group")?;
        reconciled::apply(client, desired, options)
            .await
            .context("syncing secondary runtime group")
    }

    /// Syncs `desired` to the secondary target, logging any failure.
    pub async fn push(&self, desired: &DesiredConfiguration, options: &ReconcileOptions) {
        match self.try_push(desired, options).await {
            Ok(report) => debug!("Secondary sync complete: {report}"),
            Err(e) => error!("Failed pushing configuration to the secondary target: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::error::{AdminApiError, ConfigError, PushError};
    use semver::Version;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(address: String, token: Option<&str>) -> MirrorSettings {
        MirrorSettings {
            enabled: true,
            address,
            group_name: String::from("edge"),
            token: token.map(String::from),
        }
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions {
            concurrency: 2,
            version: Version::new(3, 4, 1),
            skip_ca_certificates: true,
        }
    }

    fn root_cause(err: &PushError) -> &PushError {
        match err {
            PushError::Context { source, .. } => root_cause(source),
            other => other,
        }
    }

    #[test]
    fn test_disabled_settings_build_no_mirror() {
        assert!(SecondaryMirror::from_settings(MirrorSettings::default()).is_none());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let mirror = SecondaryMirror::new(settings(String::from("http://unused"), None));
        let err = mirror
            .try_push(&DesiredConfiguration::new(GatewayConfig::empty()), &options())
            .await
            .unwrap_err();

        assert!(matches!(
            root_cause(&err),
            PushError::Config(ConfigError::MissingEnvVar { .. })
        ));
        assert!(!mirror.is_resolved());
    }

    #[tokio::test]
    async fn test_resolves_group_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/konnect-api/api/runtime_groups"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"id": "rg-9", "name": "edge"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/konnect-api/api/runtime_groups/rg-9/[a-z_]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let mirror = SecondaryMirror::new(settings(server.uri(), Some("tok")));
        let desired = DesiredConfiguration::new(GatewayConfig::empty());

        mirror.try_push(&desired, &options()).await.expect("first");
        mirror.try_push(&desired, &options()).await.expect("second");
        assert!(mirror.is_resolved());
    }

    #[tokio::test]
    async fn test_group_not_found_is_retried_next_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/konnect-api/api/runtime_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(2)
            .mount(&server)
            .await;

        let mirror = SecondaryMirror::new(settings(server.uri(), Some("tok")));
        let desired = DesiredConfiguration::new(GatewayConfig::empty());

        for _ in 0..2 {
            let err = mirror.try_push(&desired, &options()).await.unwrap_err();
            assert!(matches!(
                root_cause(&err),
                PushError::AdminApi(AdminApiError::GroupNotFound { .. })
            ));
        }
        assert!(!mirror.is_resolved());
    }
}
