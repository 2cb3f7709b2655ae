// Catalog request handlers
// Each handler owns one span and makes exactly one upstream call

use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tracing::instrument::WithSubscriber;
use tracing::{field, info, info_span, Instrument, Span};

use super::models::Facets;
use super::{query, CatalogProxy, ProxyError};
use crate::http::{self, BoxError, ProxyBody, QueryParams};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

impl CatalogProxy {
    /// `GET /catalog/entity-facets?facet=..&filter=..`
    ///
    /// Answers with the values of one facet as a JSON array of strings.
    pub async fn entity_facets(&self, params: &QueryParams) -> Response<ProxyBody> {
        let filter = params.get("filter");
        let facet = params.get("facet");
        let span = self.new_span(|| {
            info_span!(
                "handle_catalog_entity_facets",
                facet,
                filter,
                status = field::Empty,
                error = field::Empty,
                otel.status_code = field::Empty
            )
        });

        async {
            info!(facet, "handle_catalog_entity_facets");
            match self.fetch_facet_values(facet, filter).await {
                Ok(json) => http::build_json_response(json),
                Err(err) => Self::fail(&Span::current(), &err),
            }
        }
        .instrument(span)
        .with_subscriber(self.dispatch.clone())
        .await
    }

    /// `GET /catalog/entities/by-query?filter=..&cursor=..`
    ///
    /// Relays one page of the catalog's entity listing untouched.
    pub async fn entities_by_query(&self, params: &QueryParams) -> Response<ProxyBody> {
        let filter = params.get("filter");
        let cursor = params.get("cursor");
        let span = self.new_span(|| {
            info_span!(
                "handle_catalog_entities_by_query",
                filter,
                cursor,
                status = field::Empty,
                error = field::Empty,
                otel.status_code = field::Empty
            )
        });

        async {
            info!(filter, cursor, "handle_catalog_entities_by_query");
            let opened = match query::entities_by_query_url(&self.api_url, filter, cursor) {
                Ok(url) => send_checked(self.client.get(url)).await,
                Err(e) => Err(e.into()),
            };
            match opened {
                Ok(upstream) => self.relay_body(upstream),
                Err(err) => Self::fail(&Span::current(), &err),
            }
        }
        .instrument(span)
        .with_subscriber(self.dispatch.clone())
        .await
    }

    /// `POST /catalog/entities/by-refs`
    ///
    /// Forwards the JSON request body and relays the catalog's answer untouched.
    pub async fn entities_by_refs<B>(&self, body: B) -> Response<ProxyBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let span = self.new_span(|| {
            info_span!(
                "handle_catalog_entities_by_refs",
                body_bytes = field::Empty,
                status = field::Empty,
                error = field::Empty,
                otel.status_code = field::Empty
            )
        });

        async {
            let opened = match self.open_entities_by_refs(body).await {
                Ok(upstream) => upstream,
                Err(err) => return Self::fail(&Span::current(), &err),
            };
            self.relay_body(opened)
        }
        .instrument(span)
        .with_subscriber(self.dispatch.clone())
        .await
    }

    async fn fetch_facet_values(&self, facet: &str, filter: &str) -> Result<Vec<u8>, ProxyError> {
        let url = query::entity_facets_url(&self.api_url, facet, filter)?;
        let upstream = send_checked(self.client.get(url)).await?;

        let body = upstream
            .bytes()
            .await
            .map_err(|e| ProxyError::Body(e.into()))?;
        let facets: Facets = serde_json::from_slice(&body).map_err(ProxyError::Decode)?;

        serde_json::to_vec(&facets.values(facet)).map_err(ProxyError::Encode)
    }

    async fn open_entities_by_refs<B>(&self, body: B) -> Result<reqwest::Response, ProxyError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let payload = body
            .collect()
            .await
            .map_err(|e| ProxyError::Body(e.into()))?
            .to_bytes();
        Span::current().record("body_bytes", payload.len());
        info!(body_bytes = payload.len(), "handle_catalog_entities_by_refs");

        let url = query::entities_by_refs_url(&self.api_url)?;
        send_checked(
            self.client
                .post(url)
                .header(CONTENT_TYPE, DEFAULT_CONTENT_TYPE)
                .body(payload),
        )
        .await
    }

    /// Stream a 200 upstream body to the caller without buffering
    ///
    /// The status line is already committed once streaming starts, so a
    /// failure mid-body can only be logged and abort the response.
    fn relay_body(&self, upstream: reqwest::Response) -> Response<ProxyBody> {
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let dispatch = self.dispatch.clone();
        let span = Span::current();
        let stream = upstream
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(move |e| {
                let err = ProxyError::Body(e.into());
                tracing::dispatcher::with_default(&dispatch, || {
                    span.in_scope(|| tracing::error!(error = %err, "Failed to copy response body"));
                    span.record("error", err.to_string().as_str());
                    span.record("otel.status_code", "ERROR");
                });
                BoxError::from(err)
            });

        http::build_stream_response(content_type, StreamBody::new(stream).boxed_unsync())
    }

    /// Create a span in this proxy's dispatcher rather than the global one
    fn new_span(&self, make: impl FnOnce() -> Span) -> Span {
        tracing::dispatcher::with_default(&self.dispatch, make)
    }
}

/// Send the request; anything but 200 becomes [`ProxyError::Upstream`]
async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProxyError> {
    let upstream = request.send().await.map_err(ProxyError::Transport)?;

    let status = upstream.status();
    if status == StatusCode::OK {
        return Ok(upstream);
    }

    let body = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Body(e.into()))?;
    Err(ProxyError::Upstream {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
