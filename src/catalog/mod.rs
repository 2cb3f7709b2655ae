//! Catalog proxy module
//!
//! Translates dashboard requests into calls against the catalog REST API and
//! relays the answers. One [`CatalogProxy`] is built at startup and shared by
//! every connection.

mod error;
mod handlers;
pub mod models;
pub mod query;

use std::time::Duration;

use hyper::Response;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{Dispatch, Span};

use crate::config::{PluginSettings, UpstreamConfig};
use crate::http::{self, ProxyBody};

pub use error::ProxyError;

/// Long-lived proxy instance
///
/// Holds everything a handler needs: the shared outbound client, the catalog
/// base address and the dispatcher receiving its logs and spans.
#[derive(Clone)]
pub struct CatalogProxy {
    client: reqwest::Client,
    api_url: String,
    dispatch: Dispatch,
}

impl CatalogProxy {
    /// `api_url` must already be validated and free of a trailing slash
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, dispatch: Dispatch) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            dispatch,
        }
    }

    /// Build the proxy from configuration, including its outbound client
    pub fn from_settings(
        settings: &PluginSettings,
        upstream: &UpstreamConfig,
        dispatch: Dispatch,
    ) -> anyhow::Result<Self> {
        let client = build_client(settings, upstream)?;
        Ok(Self::new(client, settings.api_url.clone(), dispatch))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Record a failure on `span`, log it and turn it into the 500 response
    ///
    /// Must run inside this proxy's dispatcher.
    fn fail(span: &Span, err: &ProxyError) -> Response<ProxyBody> {
        let message = err.to_string();
        if let Some(status) = err.upstream_status() {
            span.record("status", status.as_u16());
            tracing::error!(status = status.as_u16(), error = %message, "{}", err.context());
        } else {
            tracing::error!(error = %message, "{}", err.context());
        }
        span.record("error", message.as_str());
        span.record("otel.status_code", "ERROR");

        http::build_error_response(hyper::StatusCode::INTERNAL_SERVER_ERROR, &message)
    }
}

/// Shared outbound client; the API key becomes a default bearer header
pub fn build_client(
    settings: &PluginSettings,
    upstream: &UpstreamConfig,
) -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| anyhow::anyhow!("Invalid API key format: {e}"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(secs) = upstream.connect_timeout {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = upstream.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(agent) = &upstream.user_agent {
        builder = builder.user_agent(agent.as_str());
    }
    if upstream.no_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}
