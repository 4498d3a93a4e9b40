// ABOUTME: Error types for ephemeral key generation and encoding using thiserror.
// ABOUTME: Separates random source failures from encoder invariant violations.

use thiserror::Error;

/// Errors that can occur while generating or encoding an ephemeral key.
#[derive(Error, Debug)]
pub enum SshError {
    /// The secure random source could not supply bytes.
    ///
    /// Fatal for the invocation; there is no fallback to a weaker source.
    #[error("secure random source unavailable: {0}")]
    RandomSource(#[source] rand::Error),

    /// An internal invariant of the key or container was violated.
    ///
    /// Indicates a programming defect rather than a runtime condition.
    #[error("failed to encode private key: {0}")]
    Encoding(String),
}

/// Result type alias using SshError.
pub type Result<T> = std::result::Result<T, SshError>;
