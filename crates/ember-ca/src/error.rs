// ABOUTME: Error types for certificate issuance using thiserror.
// ABOUTME: Distinguishes a missing authority from network, protocol, and cancellation failures.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while obtaining an SSH certificate.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// The organization has no certificate authority to sign with.
    #[error(
        "no SSH certificate authority established for organization '{organization}' \
         (run `ember ssh establish --org {organization}` before retrying)"
    )]
    NoAuthority { organization: String },

    /// The authority could not be reached.
    #[error("certificate authority unreachable: {0}")]
    Unreachable(String),

    /// The authority refused the request.
    #[error("certificate request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The authority answered with something that is not a certificate.
    #[error("malformed certificate authority response: {0}")]
    MalformedResponse(String),

    /// The request failed local validation before being sent.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    /// Invalid authority address format.
    #[error("invalid authority address: {0}")]
    InvalidAddress(String),

    /// The authority failed to produce a signature.
    #[error("failed to sign certificate: {0}")]
    Signing(String),

    /// The caller cancelled the request.
    #[error("certificate issuance cancelled")]
    Cancelled,

    /// The request did not complete within the caller's deadline.
    #[error("certificate issuance timed out after {0:?}")]
    TimedOut(Duration),
}

impl IssuanceError {
    /// Whether retrying the whole issuance may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IssuanceError::Unreachable(_) | IssuanceError::TimedOut(_)
        )
    }
}

impl From<tonic::transport::Error> for IssuanceError {
    fn from(err: tonic::transport::Error) -> Self {
        IssuanceError::Unreachable(err.to_string())
    }
}

/// Result type alias using IssuanceError.
pub type Result<T> = std::result::Result<T, IssuanceError>;
