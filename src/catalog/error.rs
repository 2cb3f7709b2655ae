//! Catalog proxy errors
//!
//! Every variant ends up as an HTTP 500 with the display text as body; the
//! variants only differ in how they are logged.

use reqwest::StatusCode;

/// Errors that can occur while relaying a catalog request
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Upstream URL could not be built
    #[error("{0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network, TLS or timeout failure talking to the catalog
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    /// Catalog answered with something other than 200
    #[error("invalid response: {body}")]
    Upstream { status: StatusCode, body: String },

    /// Facets payload was not the expected JSON
    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    /// Facet values could not be serialized
    #[error("{0}")]
    Encode(#[source] serde_json::Error),

    /// Reading or relaying a body failed
    #[error("{0}")]
    Body(#[source] crate::http::BoxError),
}

impl ProxyError {
    /// Log message describing the failed step
    pub const fn context(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "Failed to create request",
            Self::Transport(_) => "Failed to run request",
            Self::Upstream { .. } => "Failed request",
            Self::Decode(_) => "Failed to decode result",
            Self::Encode(_) => "Failed to marshal facets",
            Self::Body(_) => "Failed to read response body",
        }
    }

    /// Upstream status, for non-200 responses only
    pub const fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display() {
        let err = ProxyError::Upstream {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "invalid response: service unavailable");
        assert_eq!(err.upstream_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.context(), "Failed request");
    }

    #[test]
    fn test_decode_display_is_serde_message() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let expected = source.to_string();
        let err = ProxyError::Decode(source);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.upstream_status(), None);
    }
}
