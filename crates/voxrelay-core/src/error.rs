use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoxError>;

/// A non-success HTTP response from a hosted service.
///
/// Vendor clients wrap failed responses in this so callers can inspect the
/// status (e.g. to pass a 429 through) after the error has gone through `anyhow`.
#[derive(Debug, Clone, Error)]
#[error("{service} API error {status}: {body}")]
pub struct UpstreamError {
    pub service: &'static str,
    pub status: u16,
    pub body: String,
}

impl UpstreamError {
    pub fn new(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            service,
            status,
            body: body.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Find an [`UpstreamError`] anywhere in an `anyhow` chain.
pub fn upstream_error(err: &anyhow::Error) -> Option<&UpstreamError> {
    err.chain().find_map(|cause| cause.downcast_ref::<UpstreamError>())
}
