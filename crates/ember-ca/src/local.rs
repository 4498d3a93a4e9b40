// ABOUTME: In-process SSH certificate authority keyed by organization.
// ABOUTME: Signs short-lived user certificates with ssh-key; CA keys live only in memory.

use async_trait::async_trait;
use chrono::Utc;
use ember_ssh::compute_fingerprint;
use rand::rngs::OsRng;
use rand::RngCore;
use ssh_key::certificate::{Builder, CertType};
use ssh_key::public::{Ed25519PublicKey, KeyData};
use ssh_key::{Algorithm, PrivateKey};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{IssuanceError, Result};
use crate::issuer::CertificateIssuer;
use crate::request::{AuthorityContext, Certificate, IssueRequest, Principals, ValidityWindow};

/// Certificate authority holding one ed25519 CA key per organization.
///
/// Signs only the single-use principals for at most one hour unless
/// configured otherwise.
pub struct LocalAuthority {
    authorities: RwLock<HashMap<String, PrivateKey>>,
    max_validity: ValidityWindow,
    allowed_principals: Principals,
}

impl Default for LocalAuthority {
    fn default() -> Self {
        Self {
            authorities: RwLock::new(HashMap::new()),
            max_validity: ValidityWindow::single_use(),
            allowed_principals: Principals::single_use(),
        }
    }
}

impl LocalAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest window this authority will sign.
    pub fn with_max_validity(mut self, max_validity: ValidityWindow) -> Self {
        self.max_validity = max_validity;
        self
    }

    /// Principals a certificate may assert.
    pub fn with_allowed_principals(mut self, principals: Principals) -> Self {
        self.allowed_principals = principals;
        self
    }

    pub fn max_validity(&self) -> ValidityWindow {
        self.max_validity
    }

    /// Reject requests outside the signing policy.
    pub fn check_policy(&self, request: &IssueRequest) -> Result<()> {
        if request.validity.hours() > self.max_validity.hours() {
            return Err(IssuanceError::InvalidRequest(format!(
                "validity window of {} hours exceeds the maximum of {}",
                request.validity.hours(),
                self.max_validity.hours()
            )));
        }

        let allowed = self.allowed_principals.as_slice();
        if let Some(principal) = request
            .principals
            .as_slice()
            .iter()
            .find(|p| !allowed.contains(*p))
        {
            return Err(IssuanceError::InvalidRequest(format!(
                "principal '{}' is not allowed",
                principal
            )));
        }
        Ok(())
    }

    /// Create the organization's CA key, or return the existing one unless `replace` is set.
    ///
    /// Returns the CA public key as an OpenSSH line.
    pub async fn establish(&self, context: &AuthorityContext, replace: bool) -> Result<String> {
        let mut authorities = self.authorities.write().await;

        if !replace {
            if let Some(existing) = authorities.get(context.organization()) {
                return existing
                    .public_key()
                    .to_openssh()
                    .map_err(|e| IssuanceError::Signing(e.to_string()));
            }
        }

        let mut ca_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .map_err(|e| IssuanceError::Signing(e.to_string()))?;
        ca_key.set_comment(format!("{}-ca", context.organization()));
        let ca_public_key = ca_key
            .public_key()
            .to_openssh()
            .map_err(|e| IssuanceError::Signing(e.to_string()))?;

        authorities.insert(context.organization().to_string(), ca_key);
        info!(organization = %context, replace, "certificate authority established");

        Ok(ca_public_key)
    }

    /// CA public key for the organization, if one has been established.
    pub async fn ca_public_key(&self, context: &AuthorityContext) -> Option<String> {
        let authorities = self.authorities.read().await;
        authorities
            .get(context.organization())
            .and_then(|key| key.public_key().to_openssh().ok())
    }
}

#[async_trait]
impl CertificateIssuer for LocalAuthority {
    async fn issue(&self, request: &IssueRequest) -> Result<Certificate> {
        self.check_policy(request)?;

        let authorities = self.authorities.read().await;
        let ca_key = authorities
            .get(request.context.organization())
            .ok_or_else(|| IssuanceError::NoAuthority {
                organization: request.context.organization().to_string(),
            })?;

        let valid_after = u64::try_from(Utc::now().timestamp())
            .map_err(|_| IssuanceError::Signing("system clock is before 1970".to_string()))?;
        let valid_before = valid_after + request.validity.as_duration().as_secs();
        let fingerprint = compute_fingerprint(&request.public_key)
            .map_err(|e| IssuanceError::InvalidRequest(e.to_string()))?;

        let subject = KeyData::Ed25519(Ed25519PublicKey(request.public_key));
        let mut builder =
            Builder::new_with_random_nonce(&mut OsRng, subject, valid_after, valid_before)
                .map_err(signing_error)?;
        builder.serial(OsRng.next_u64()).map_err(signing_error)?;
        builder
            .key_id(format!("{}:{}", request.context.organization(), fingerprint))
            .map_err(signing_error)?;
        builder.cert_type(CertType::User).map_err(signing_error)?;
        for principal in request.principals.as_slice() {
            builder.valid_principal(principal).map_err(signing_error)?;
        }

        let certificate = builder.sign(ca_key).map_err(signing_error)?;
        let text = certificate.to_openssh().map_err(signing_error)?;

        debug!(
            organization = %request.context,
            fingerprint = %fingerprint,
            valid_hours = request.validity.hours(),
            "certificate signed"
        );

        Certificate::from_openssh(text)
    }
}

fn signing_error(err: ssh_key::Error) -> IssuanceError {
    IssuanceError::Signing(err.to_string())
}
