// ABOUTME: Error types for credential orchestration and session handoff using thiserror.
// ABOUTME: Tags every failure with the phase it came from so no partial credential escapes.

use ember_ca::IssuanceError;
use ember_ssh::SshError;
use std::fmt;
use thiserror::Error;

/// Step of the credential flow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialPhase {
    KeyGeneration,
    Issuance,
    Encoding,
}

impl fmt::Display for CredentialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialPhase::KeyGeneration => "key generation",
            CredentialPhase::Issuance => "certificate issuance",
            CredentialPhase::Encoding => "private key encoding",
        };
        f.write_str(name)
    }
}

/// Errors from producing a single-use credential.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[source] SshError),

    #[error("certificate issuance failed: {0}")]
    Issuance(#[source] IssuanceError),

    #[error("private key encoding failed: {0}")]
    Encoding(#[source] SshError),

    #[error("credential request cancelled")]
    Cancelled,
}

impl CredentialError {
    /// The step that failed. Cancellation can only interrupt issuance.
    pub fn phase(&self) -> CredentialPhase {
        match self {
            CredentialError::KeyGeneration(_) => CredentialPhase::KeyGeneration,
            CredentialError::Issuance(_) | CredentialError::Cancelled => CredentialPhase::Issuance,
            CredentialError::Encoding(_) => CredentialPhase::Encoding,
        }
    }

    /// Whether the caller may retry the whole flow.
    pub fn is_retryable(&self) -> bool {
        match self {
            CredentialError::Issuance(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<IssuanceError> for CredentialError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::Cancelled => CredentialError::Cancelled,
            other => CredentialError::Issuance(other),
        }
    }
}

/// Errors from handing a credential to the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("remote command failed: {0}")]
    Remote(String),

    #[error("session cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_phase_of_each_variant() {
        let keygen = CredentialError::KeyGeneration(SshError::RandomSource(rand::Error::new(
            "no entropy",
        )));
        assert_eq!(keygen.phase(), CredentialPhase::KeyGeneration);

        let issuance = CredentialError::Issuance(IssuanceError::Unreachable("down".to_string()));
        assert_eq!(issuance.phase(), CredentialPhase::Issuance);

        let encoding = CredentialError::Encoding(SshError::Encoding("mismatch".to_string()));
        assert_eq!(encoding.phase(), CredentialPhase::Encoding);

        assert_eq!(CredentialError::Cancelled.phase(), CredentialPhase::Issuance);
    }

    #[test]
    fn test_issuance_cancel_maps_to_cancelled() {
        let err: CredentialError = IssuanceError::Cancelled.into();
        assert!(matches!(err, CredentialError::Cancelled));

        let err: CredentialError = IssuanceError::TimedOut(Duration::from_secs(1)).into();
        assert!(matches!(err, CredentialError::Issuance(IssuanceError::TimedOut(_))));
    }

    #[test]
    fn test_retryable_follows_issuance() {
        let err = CredentialError::Issuance(IssuanceError::Unreachable("down".to_string()));
        assert!(err.is_retryable());

        let err = CredentialError::Issuance(IssuanceError::NoAuthority {
            organization: "acme".to_string(),
        });
        assert!(!err.is_retryable());
        assert!(!CredentialError::Cancelled.is_retryable());
    }

    #[test]
    fn test_no_authority_guidance_survives_wrapping() {
        let err = SessionError::from(CredentialError::Issuance(IssuanceError::NoAuthority {
            organization: "acme".to_string(),
        }));
        let display = err.to_string();
        assert!(display.contains("certificate issuance failed"));
        assert!(display.contains("ember ssh establish --org acme"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CredentialPhase::KeyGeneration.to_string(), "key generation");
        assert_eq!(CredentialPhase::Encoding.to_string(), "private key encoding");
    }
}
