// ABOUTME: gRPC client for the remote certificate authority.
// ABOUTME: Injects bearer auth, maps status codes to issuance errors, validates responses.

use async_trait::async_trait;
use ember_proto::client::CertificateAuthorityClient;
use ember_proto::{EstablishAuthorityRequest, IssueCertificateRequest};
use tonic::codegen::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Code, Status};

use crate::channel::{create_channel, ChannelConfig};
use crate::error::{IssuanceError, Result};
use crate::issuer::CertificateIssuer;
use crate::request::{AuthorityContext, Certificate, IssueRequest};

/// Interceptor that adds a bearer token to every request.
#[derive(Clone)]
pub struct BearerAuth {
    token: Option<String>,
}

impl BearerAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl Interceptor for BearerAuth {
    fn call(
        &mut self,
        mut req: tonic::Request<()>,
    ) -> std::result::Result<tonic::Request<()>, Status> {
        if let Some(ref token) = self.token {
            let value = format!("Bearer {}", token)
                .parse()
                .map_err(|_| Status::internal("invalid token format"))?;
            req.metadata_mut().insert("authorization", value);
        }
        Ok(req)
    }
}

type AuthorityClient = CertificateAuthorityClient<InterceptedService<Channel, BearerAuth>>;

/// Certificate issuer backed by the `CertificateAuthority` gRPC service.
#[derive(Clone)]
pub struct GrpcIssuer {
    client: AuthorityClient,
}

impl GrpcIssuer {
    /// Build an issuer for the configured authority.
    ///
    /// Must be called inside a tokio runtime. No connection is made until
    /// the first request.
    pub fn new(config: &ChannelConfig, token: Option<String>) -> Result<Self> {
        let channel = create_channel(config)?;
        Ok(Self::from_channel(channel, token))
    }

    pub fn from_channel(channel: Channel, token: Option<String>) -> Self {
        Self {
            client: CertificateAuthorityClient::with_interceptor(channel, BearerAuth::new(token)),
        }
    }

    /// Create the organization's certificate authority, or fetch the existing one.
    ///
    /// Returns the authority's OpenSSH public key line.
    pub async fn establish(&self, context: &AuthorityContext, replace: bool) -> Result<String> {
        let mut client = self.client.clone();
        let response = client
            .establish_authority(EstablishAuthorityRequest {
                organization: context.organization().to_string(),
                replace,
            })
            .await
            .map_err(|status| status_to_error(status, context))?;

        let ca_public_key = response.into_inner().ca_public_key;
        if ca_public_key.trim().is_empty() {
            return Err(IssuanceError::MalformedResponse(
                "empty authority public key".to_string(),
            ));
        }
        Ok(ca_public_key)
    }
}

#[async_trait]
impl CertificateIssuer for GrpcIssuer {
    async fn issue(&self, request: &IssueRequest) -> Result<Certificate> {
        let mut client = self.client.clone();
        let response = client
            .issue_certificate(IssueCertificateRequest {
                organization: request.context.organization().to_string(),
                principals: request.principals.as_slice().to_vec(),
                valid_hours: request.validity.hours(),
                public_key: request.public_key.to_vec(),
            })
            .await
            .map_err(|status| status_to_error(status, &request.context))?;

        Certificate::from_openssh(response.into_inner().certificate)
    }
}

/// Translate a gRPC status into an issuance error for `context`.
pub fn status_to_error(status: Status, context: &AuthorityContext) -> IssuanceError {
    match status.code() {
        Code::NotFound | Code::FailedPrecondition => IssuanceError::NoAuthority {
            organization: context.organization().to_string(),
        },
        Code::Unavailable | Code::DeadlineExceeded => {
            IssuanceError::Unreachable(status.message().to_string())
        }
        Code::Cancelled => IssuanceError::Cancelled,
        Code::InvalidArgument => IssuanceError::InvalidRequest(status.message().to_string()),
        code => IssuanceError::Rejected {
            code: format!("{:?}", code),
            message: status.message().to_string(),
        },
    }
}
