//! Transport errors for the generation engine endpoint.
//!
//! Everything in [`EngineError`] is a failure of the request layer, never of
//! the job itself. The controller treats these as non-terminal: the polling
//! timer keeps running and the next tick retries.

use thiserror::Error;

/// Errors that can occur while talking to the generation server.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying network failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned status {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not valid JSON.
    #[error("malformed response body: {0}")]
    Decode(String),

    /// An endpoint could not be resolved against the server URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
