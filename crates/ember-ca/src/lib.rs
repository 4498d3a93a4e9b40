// ABOUTME: SSH certificate issuance for single-use credentials.
// ABOUTME: Issuer trait, gRPC client, local authority, and the authority gRPC server.

//! Certificate issuance against an organization's SSH certificate authority.
//!
//! [`CertificateIssuer`] is the seam the credential orchestrator depends on.
//! [`GrpcIssuer`] talks to a remote authority; [`LocalAuthority`] signs
//! in-process and backs the [`AuthorityService`] gRPC server.

mod channel;
mod error;
mod grpc;
mod issuer;
mod local;
mod request;
mod server;

pub use channel::{create_channel, normalize_address, ChannelConfig, DEFAULT_AUTHORITY};
pub use error::{IssuanceError, Result};
pub use grpc::{status_to_error, BearerAuth, GrpcIssuer};
pub use issuer::{issue_cancellable, CertificateIssuer};
pub use local::LocalAuthority;
pub use request::{
    AuthorityContext, Certificate, IssueRequest, Principals, ValidityWindow, ADMIN_PRINCIPAL,
    SERVICE_PRINCIPAL, SINGLE_USE_VALID_HOURS,
};
pub use server::{
    error_to_status, issue_request_from_proto, serve, serve_listener, AuthorityService, ServeError,
};
