//! Top-level error types for the bridge.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
///
/// Missing credentials are not fatal at startup — the affected pipeline step
/// is skipped with a warning. These errors surface only when a component is
/// constructed without the credentials it needs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures talking to the Dify chat-messages endpoint.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("dify request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("dify returned {status}: {body}")]
    Api {
        status: u16,
        /// Machine-readable error code from the response body, when present.
        code: Option<String>,
        body: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UpstreamError {
    /// Whether this is the stale-conversation rejection that warrants one
    /// retry without a `conversation_id`.
    pub fn is_stale_conversation(&self) -> bool {
        matches!(
            self,
            UpstreamError::Api { status: 404, code: Some(code), .. } if code == "not_found"
        )
    }
}

/// Failures pushing a segment to the Chatfuel broadcast endpoint.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("broadcast of segment {segment} failed: {source}")]
    Transport {
        segment: usize,
        source: reqwest::Error,
    },

    #[error("broadcast of segment {segment} rejected with {status}: {body}")]
    Api {
        segment: usize,
        status: u16,
        body: String,
    },
}
