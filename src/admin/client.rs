//! Admin API client implementation.
//!
//! This module provides the HTTP client for a proxy's admin API, and for the
//! secondary control plane which exposes the same entity surface.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{AdminApiError, ConfigError, NetworkErrorKind, PushError, Result};

use super::types::{EntityKind, Page, RootInfo, Status};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default upper bound on followed list pages.
const MAX_PAGES: usize = 10_000;

/// Admin API client.
#[derive(Debug, Clone)]
pub struct AdminClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Headers sent with every request.
    headers: HeaderMap,
    /// Most list pages followed before a listing is rejected.
    max_pages: usize,
}

impl AdminClient {
    /// Creates a new admin API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PushError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            headers: HeaderMap::new(),
            max_pages: MAX_PAGES,
        })
    }

    /// Sets how many list pages are followed before a listing that still
    /// points at a `next` page is rejected.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid HTTP header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| ConfigError::validation(format!("Invalid header name: {e}"), "admin_header"))?;
        let value = HeaderValue::from_str(value.trim()).map_err(|e| {
            ConfigError::validation(format!("Invalid header value: {e}"), "admin_header")
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Authenticates every request with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn with_bearer_token(mut self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            AdminApiError::AuthenticationFailed {
                message: String::from("Bearer token contains invalid characters"),
            }
        })?;
        value.set_sensitive(true);
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(self)
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.is_empty() || path == "/" {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .headers(self.headers.clone())
    }

    /// Sends a request, mapping transport failures and error statuses.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;

        let status = response.status();
        trace!("{endpoint} -> {status}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = error_message(response.text().await.unwrap_or_default());
            return Err(AdminApiError::AuthenticationFailed {
                message: format!("{status}: {message}"),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminApiError::api_error(status.as_u16(), error_message(body)).into());
        }

        Ok(response)
    }

    /// Sends a request and decodes the JSON response body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T> {
        let response = self.send(request, endpoint).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, &e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            AdminApiError::invalid_response(format!("Failed to parse response from {endpoint}: {e}"))
                .into()
        })
    }

    /// Fetches and decodes a JSON document relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.send_json(self.request(Method::GET, &url), &url).await
    }

    /// Reads the root endpoint (version and database mode).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn root(&self) -> Result<RootInfo> {
        self.get_json("/").await
    }

    /// Reads the status endpoint. Used as a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn status(&self) -> Result<Status> {
        self.get_json("status").await
    }

    /// Posts a complete declarative configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the proxy rejects the
    /// document.
    pub async fn post_config(&self, body: Vec<u8>, check_hash: bool) -> Result<()> {
        let mut url = self.url("config");
        if check_hash {
            url.push_str("?check_hash=1");
        }
        debug!("Posting {} byte configuration to {url}", body.len());

        let request = self
            .request(Method::POST, &url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request, &url).await?;
        Ok(())
    }

    /// Lists every entity of a kind, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched or decoded, or if the
    /// listing has not ended after the page limit.
    pub async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Map<String, Value>>> {
        let mut entities = Vec::new();
        let mut next = Some(self.url(kind.path()));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == self.max_pages {
                return Err(AdminApiError::invalid_response(format!(
                    "{} listing still has a next page after {pages} pages",
                    kind.path()
                ))
                .into());
            }
            pages += 1;
            let page: Page = self.send_json(self.request(Method::GET, &url), &url).await?;

            for item in page.data {
                match item {
                    Value::Object(body) => entities.push(body),
                    other => {
                        return Err(AdminApiError::invalid_response(format!(
                            "Expected {} objects, found {other}",
                            kind.singular()
                        ))
                        .into());
                    }
                }
            }

            next = page
                .next
                .filter(|n| !n.is_empty())
                .map(|n| self.url(&n));
        }

        debug!("Listed {} {} entities", entities.len(), kind.path());
        Ok(entities)
    }

    /// Creates or replaces an entity by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the proxy rejects the entity.
    pub async fn upsert_entity(
        &self,
        kind: EntityKind,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let url = self.url(&format!("{}/{id}", kind.path()));
        self.send_json(self.request(Method::PUT, &url).json(body), &url)
            .await
    }

    /// Deletes an entity by id. A missing entity is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{id}", kind.path()));
        match self.send(self.request(Method::DELETE, &url), &url).await {
            Ok(_) => Ok(()),
            Err(PushError::AdminApi(e)) if e.status() == Some(404) => {
                debug!("{} {id} already deleted", kind.singular());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Maps a reqwest error to a network error class.
///
/// Requests that could not be built (a malformed admin URL) never reached
/// the network and are configuration errors.
fn transport_error(endpoint: &str, e: &reqwest::Error) -> PushError {
    if e.is_builder() {
        return ConfigError::validation(
            format!("Invalid admin request '{endpoint}': {e}"),
            "admin_url",
        )
        .into();
    }
    let kind = if e.is_timeout() {
        NetworkErrorKind::Timeout
    } else if e.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Transport
    };
    AdminApiError::network(kind, endpoint, e.to_string()).into()
}

/// Extracts `message` from a JSON error body, falling back to the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or(body)
}
