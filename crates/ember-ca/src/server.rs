// ABOUTME: CertificateAuthority gRPC service backed by the local in-memory authority.
// ABOUTME: Validates requests, optionally checks a bearer token, and runs the tonic server.

use ember_proto::server::{CertificateAuthority, CertificateAuthorityServer};
use ember_proto::{
    EstablishAuthorityRequest, EstablishedAuthority, IssueCertificateRequest, IssuedCertificate,
};
use ember_ssh::PUBLIC_KEY_LEN;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::error::IssuanceError;
use crate::issuer::CertificateIssuer;
use crate::local::LocalAuthority;
use crate::request::{AuthorityContext, IssueRequest, Principals, ValidityWindow};

/// gRPC front for a [`LocalAuthority`].
#[derive(Clone)]
pub struct AuthorityService {
    authority: Arc<LocalAuthority>,
    token: Option<String>,
}

impl AuthorityService {
    pub fn new(authority: Arc<LocalAuthority>) -> Self {
        Self {
            authority,
            token: None,
        }
    }

    /// Require `authorization: Bearer <token>` on every call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorize<T>(&self, request: &Request<T>) -> Result<(), Status> {
        let Some(ref expected) = self.token else {
            return Ok(());
        };
        let presented = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented == Some(expected.as_str()) {
            Ok(())
        } else {
            warn!("rejected request with missing or wrong bearer token");
            Err(Status::unauthenticated("invalid or missing bearer token"))
        }
    }

    pub fn into_server(self) -> CertificateAuthorityServer<Self> {
        CertificateAuthorityServer::new(self)
    }
}

#[tonic::async_trait]
impl CertificateAuthority for AuthorityService {
    async fn issue_certificate(
        &self,
        request: Request<IssueCertificateRequest>,
    ) -> Result<Response<IssuedCertificate>, Status> {
        self.authorize(&request)?;
        let issue = issue_request_from_proto(request.into_inner()).map_err(error_to_status)?;

        let certificate = self.authority.issue(&issue).await.map_err(error_to_status)?;
        info!(
            organization = %issue.context,
            principals = ?issue.principals.as_slice(),
            valid_hours = issue.validity.hours(),
            "issued certificate"
        );

        Ok(Response::new(IssuedCertificate {
            certificate: certificate.into_string(),
        }))
    }

    async fn establish_authority(
        &self,
        request: Request<EstablishAuthorityRequest>,
    ) -> Result<Response<EstablishedAuthority>, Status> {
        self.authorize(&request)?;
        let req = request.into_inner();
        let context = AuthorityContext::new(req.organization).map_err(error_to_status)?;

        let ca_public_key = self
            .authority
            .establish(&context, req.replace)
            .await
            .map_err(error_to_status)?;

        Ok(Response::new(EstablishedAuthority { ca_public_key }))
    }
}

/// Validate a wire request into an [`IssueRequest`].
pub fn issue_request_from_proto(
    req: IssueCertificateRequest,
) -> Result<IssueRequest, IssuanceError> {
    let context = AuthorityContext::new(req.organization)?;
    let principals = Principals::new(req.principals)?;
    let validity = ValidityWindow::from_hours(req.valid_hours)?;
    let public_key: [u8; PUBLIC_KEY_LEN] = req.public_key.as_slice().try_into().map_err(|_| {
        IssuanceError::InvalidRequest(format!(
            "public key must be {} bytes, got {}",
            PUBLIC_KEY_LEN,
            req.public_key.len()
        ))
    })?;

    Ok(IssueRequest {
        context,
        principals,
        validity,
        public_key,
    })
}

/// Map an issuance error onto the status the gRPC client expects.
pub fn error_to_status(err: IssuanceError) -> Status {
    match err {
        IssuanceError::NoAuthority { .. } => Status::failed_precondition(err.to_string()),
        IssuanceError::InvalidRequest(_) => Status::invalid_argument(err.to_string()),
        IssuanceError::Cancelled => Status::cancelled(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

/// Bind `addr` and serve the authority until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    service: AuthorityService,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, service, shutdown).await?;
    Ok(())
}

/// Failure to bind or run the authority server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Serve the authority on an already bound listener until `shutdown` resolves.
pub async fn serve_listener(
    listener: TcpListener,
    service: AuthorityService,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("certificate authority listening on {}", addr);
    }

    Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    info!("certificate authority shut down");
    Ok(())
}
