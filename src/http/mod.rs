//! HTTP protocol layer module
//!
//! Body type, response builders and query-string parsing shared by the router
//! and the catalog handlers.

pub mod query;
pub mod response;

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;

// Re-export commonly used types
pub use query::QueryParams;
pub use response::{
    build_404_response, build_405_response, build_413_response, build_error_response,
    build_health_response, build_json_response, build_options_response, build_stream_response,
};

/// Error type carried by response bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body: either a buffered payload or a relayed upstream stream
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Wrap a complete payload as a response body
pub fn full(data: impl Into<Bytes>) -> ProxyBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Empty response body
pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}
