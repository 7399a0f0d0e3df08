use thiserror::Error;

/// Reasons a single probe can fail. None of these escape the probe boundary:
/// every variant is folded into `ProbeOutcome::None`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("host did not resolve: {0}")]
    Unresolved(String),

    #[error("no response within timeout")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}
