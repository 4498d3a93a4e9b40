// ABOUTME: Re-exports generated protobuf types for the ember certificate authority.
// ABOUTME: Single source of truth for the CA gRPC service and message types.

#![allow(clippy::derive_partial_eq_without_eq)]

/// Generated protobuf types for the ember protocol.
pub mod ember {
    tonic::include_proto!("ember");
}

pub use ember::*;

pub mod client {
    pub use super::ember::certificate_authority_client::CertificateAuthorityClient;
}

pub mod server {
    pub use super::ember::certificate_authority_server::{
        CertificateAuthority, CertificateAuthorityServer,
    };
}
