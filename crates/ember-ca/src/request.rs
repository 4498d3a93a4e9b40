// ABOUTME: Value types for a certificate request: authority context, principals, validity.
// ABOUTME: Validates invariants at construction and fixes the single-use issuance parameters.

use crate::error::{IssuanceError, Result};
use ember_ssh::PUBLIC_KEY_LEN;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

/// Administrative principal asserted by single-use certificates.
pub const ADMIN_PRINCIPAL: &str = "root";

/// Service principal asserted by single-use certificates.
pub const SERVICE_PRINCIPAL: &str = "ember";

/// Lifetime of a single-use certificate, in hours.
pub const SINGLE_USE_VALID_HOURS: u32 = 1;

/// Identifies whose certificate authority signs the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorityContext {
    organization: String,
}

impl AuthorityContext {
    /// # Errors
    /// Returns `IssuanceError::InvalidRequest` for a blank organization.
    pub fn new(organization: impl Into<String>) -> Result<Self> {
        let organization = organization.into().trim().to_string();
        if organization.is_empty() {
            return Err(IssuanceError::InvalidRequest(
                "organization must not be empty".to_string(),
            ));
        }
        Ok(Self { organization })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }
}

impl fmt::Display for AuthorityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.organization)
    }
}

/// Ordered, non-empty list of identities a certificate asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principals(Vec<String>);

impl Principals {
    /// # Errors
    /// Returns `IssuanceError::InvalidRequest` if the list or any entry is empty.
    pub fn new(principals: Vec<String>) -> Result<Self> {
        if principals.is_empty() {
            return Err(IssuanceError::InvalidRequest(
                "at least one principal is required".to_string(),
            ));
        }
        if principals.iter().any(|p| p.trim().is_empty()) {
            return Err(IssuanceError::InvalidRequest(
                "principals must not be blank".to_string(),
            ));
        }
        Ok(Self(principals))
    }

    /// The fixed administrative and service principals used for single-use credentials.
    pub fn single_use() -> Self {
        Self(vec![
            ADMIN_PRINCIPAL.to_string(),
            SERVICE_PRINCIPAL.to_string(),
        ])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strictly positive certificate lifetime measured from issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow(NonZeroU32);

impl ValidityWindow {
    /// # Errors
    /// Returns `IssuanceError::InvalidRequest` for a zero-hour window.
    pub fn from_hours(hours: u32) -> Result<Self> {
        NonZeroU32::new(hours).map(Self).ok_or_else(|| {
            IssuanceError::InvalidRequest("validity window must be at least one hour".to_string())
        })
    }

    pub fn single_use() -> Self {
        Self(NonZeroU32::MIN)
    }

    pub fn hours(&self) -> u32 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0.get()) * 3600)
    }
}

/// Everything the authority needs to sign one public key.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub context: AuthorityContext,
    pub principals: Principals,
    pub validity: ValidityWindow,
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl IssueRequest {
    /// Request with the fixed single-use principals and a one-hour window.
    pub fn single_use(context: AuthorityContext, public_key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self {
            context,
            principals: Principals::single_use(),
            validity: ValidityWindow::single_use(),
            public_key,
        }
    }
}

/// Signed OpenSSH certificate returned by the authority.
///
/// Held as the authority's text form and never parsed or altered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate(String);

impl Certificate {
    /// Accept an OpenSSH certificate line such as `ssh-ed25519-cert-v01@openssh.com AAAA...`.
    ///
    /// # Errors
    /// Returns `IssuanceError::MalformedResponse` if the text is empty or not a
    /// certificate line.
    pub fn from_openssh(text: impl Into<String>) -> Result<Self> {
        let text = text.into().trim().to_string();
        let mut fields = text.split_whitespace();
        let (Some(key_type), Some(_blob)) = (fields.next(), fields.next()) else {
            return Err(IssuanceError::MalformedResponse(
                "empty certificate".to_string(),
            ));
        };
        if !key_type.ends_with("-cert-v01@openssh.com") {
            return Err(IssuanceError::MalformedResponse(format!(
                "expected an OpenSSH certificate, got key type '{}'",
                key_type
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_context_trims_and_rejects_blank() {
        let ctx = AuthorityContext::new("  acme  ").expect("should accept organization");
        assert_eq!(ctx.organization(), "acme");

        assert!(matches!(
            AuthorityContext::new("   "),
            Err(IssuanceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_single_use_principals_are_fixed() {
        let principals = Principals::single_use();
        assert_eq!(principals.as_slice(), &["root", "ember"]);
        assert_eq!(principals.len(), 2);
    }

    #[test]
    fn test_principals_reject_empty_list_and_blank_entries() {
        assert!(matches!(
            Principals::new(vec![]),
            Err(IssuanceError::InvalidRequest(_))
        ));
        assert!(matches!(
            Principals::new(vec!["root".to_string(), " ".to_string()]),
            Err(IssuanceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_principals_keep_order() {
        let principals = Principals::new(vec!["b".to_string(), "a".to_string()])
            .expect("should accept principals");
        assert_eq!(principals.as_slice(), &["b", "a"]);
    }

    #[test]
    fn test_validity_window() {
        assert_eq!(ValidityWindow::single_use().hours(), 1);
        assert_eq!(
            ValidityWindow::single_use().as_duration(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            ValidityWindow::from_hours(12).expect("should accept").hours(),
            12
        );
        assert!(matches!(
            ValidityWindow::from_hours(0),
            Err(IssuanceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_single_use_request() {
        let ctx = AuthorityContext::new("acme").expect("should accept organization");
        let request = IssueRequest::single_use(ctx.clone(), [7u8; 32]);

        assert_eq!(request.context, ctx);
        assert_eq!(request.principals, Principals::single_use());
        assert_eq!(request.validity.hours(), SINGLE_USE_VALID_HOURS);
        assert_eq!(request.public_key, [7u8; 32]);
    }

    #[test]
    fn test_certificate_accepts_openssh_cert_line() {
        let cert = Certificate::from_openssh(
            "ssh-ed25519-cert-v01@openssh.com AAAAIHNzaC1lZDI1NTE5LWNlcnQ= single-use\n",
        )
        .expect("should accept certificate");

        assert!(cert.as_str().starts_with("ssh-ed25519-cert-v01@openssh.com "));
        assert!(!cert.as_str().ends_with('\n'));
    }

    #[test]
    fn test_certificate_rejects_malformed_text() {
        assert!(matches!(
            Certificate::from_openssh(""),
            Err(IssuanceError::MalformedResponse(_))
        ));
        assert!(matches!(
            Certificate::from_openssh("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5"),
            Err(IssuanceError::MalformedResponse(_))
        ));
        assert!(matches!(
            Certificate::from_openssh("ssh-ed25519-cert-v01@openssh.com"),
            Err(IssuanceError::MalformedResponse(_))
        ));
    }
}
