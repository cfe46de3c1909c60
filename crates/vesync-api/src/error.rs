use thiserror::Error;

/// Top-level error type for the `vesync-api` crate.
///
/// Only construction-time and parsing failures surface as `Error`. A single
/// HTTP exchange never fails with it: the transport folds network errors
/// into an empty [`ApiResponse`](crate::ApiResponse) instead.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),

    /// TLS setup error while building the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Token was not a decodable JWT.
    #[error("Malformed token: {0}")]
    Token(String),
}
