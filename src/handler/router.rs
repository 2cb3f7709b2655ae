//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation,
//! exact path matching, and dispatching to the catalog handlers.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::Limited;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_LENGTH};
use hyper::{Method, Request, Response};

use crate::config::{AppState, RoutesConfig};
use crate::http::{self, BoxError, ProxyBody, QueryParams};

pub const ENTITY_FACETS_PATH: &str = "/catalog/entity-facets";
pub const ENTITIES_BY_QUERY_PATH: &str = "/catalog/entities/by-query";
pub const ENTITIES_BY_REFS_PATH: &str = "/catalog/entities/by-refs";

const ALLOW_READ: &str = "GET, HEAD, OPTIONS";
const ALLOW_WRITE: &str = "POST, OPTIONS";

/// Resolved route of an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    EntityFacets,
    EntitiesByQuery,
    EntitiesByRefs,
}

impl Route {
    /// Methods accepted on this route, as sent in `Allow`
    pub const fn allow(self) -> &'static str {
        match self {
            Self::EntitiesByRefs => ALLOW_WRITE,
            Self::Health | Self::EntityFacets | Self::EntitiesByQuery => ALLOW_READ,
        }
    }
}

/// Match a path exactly, after stripping the configured base path
///
/// Health probes are matched on the raw path so they stay reachable at the
/// root whatever the base path is.
pub fn resolve(path: &str, routes: &RoutesConfig) -> Option<Route> {
    if routes.health.enabled
        && (path == routes.health.liveness_path || path == routes.health.readiness_path)
    {
        return Some(Route::Health);
    }

    let path = if routes.base_path.is_empty() {
        path
    } else {
        path.strip_prefix(routes.base_path.as_str())?
    };

    match path {
        ENTITY_FACETS_PATH => Some(Route::EntityFacets),
        ENTITIES_BY_QUERY_PATH => Some(Route::EntitiesByQuery),
        ENTITIES_BY_REFS_PATH => Some(Route::EntitiesByRefs),
        _ => None,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ProxyBody>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let enable_cors = state.config.http.enable_cors;

    let Some(route) = resolve(req.uri().path(), &state.config.routes) else {
        tracing::debug!(path = req.uri().path(), "No route");
        return Ok(with_cors(http::build_404_response(), enable_cors));
    };

    let method = req.method().clone();
    let response = match (&method, route) {
        (&Method::OPTIONS, _) => http::build_options_response(route.allow(), enable_cors),
        (&Method::GET | &Method::HEAD, Route::Health) => http::build_health_response("ok"),
        (&Method::GET | &Method::HEAD, Route::EntityFacets) => {
            let params = QueryParams::parse(req.uri().query());
            state.proxy.entity_facets(&params).await
        }
        (&Method::GET | &Method::HEAD, Route::EntitiesByQuery) => {
            let params = QueryParams::parse(req.uri().query());
            state.proxy.entities_by_query(&params).await
        }
        (&Method::POST, Route::EntitiesByRefs) => {
            let max_body_size = state.config.http.max_body_size;
            if let Some(resp) = check_body_size(&req, max_body_size) {
                return Ok(with_cors(resp, enable_cors));
            }
            let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
            state
                .proxy
                .entities_by_refs(Limited::new(req.into_body(), limit))
                .await
        }
        (other, _) => {
            tracing::warn!("Method not allowed: {other}");
            http::build_405_response(route.allow())
        }
    };

    Ok(with_cors(response, enable_cors))
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<ProxyBody>> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            tracing::warn!("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                tracing::error!("Request body too large: {size} bytes (max: {max_body_size})");
                Some(http::build_413_response())
            }
            Err(_) => {
                tracing::warn!("Invalid Content-Length value: '{size_str}', skipping size check");
                None
            }
            _ => None,
        },
    )
}

fn with_cors(mut response: Response<ProxyBody>, enable_cors: bool) -> Response<ProxyBody> {
    if enable_cors {
        response
            .headers_mut()
            .insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    }
    response
}
