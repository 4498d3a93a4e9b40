// ABOUTME: gRPC channel configuration for reaching the certificate authority.
// ABOUTME: Detects TLS from the URL scheme and connects lazily so cancellation covers dialing.

use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::error::{IssuanceError, Result};

/// Default certificate authority address.
pub const DEFAULT_AUTHORITY: &str = "http://127.0.0.1:50061";

/// Configuration for creating a channel to the certificate authority.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Authority address (e.g., "https://ca.example.com").
    pub address: String,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
    /// Enable TLS for the connection.
    pub use_tls: bool,
}

impl ChannelConfig {
    /// Create a channel config with default settings.
    /// Adds `http://` to bare host:port addresses and auto-detects TLS from `https://`.
    pub fn new(address: impl Into<String>) -> Self {
        let addr = normalize_address(&address.into());
        let use_tls = Self::detect_tls(&addr);
        Self {
            address: addr,
            connect_timeout: Some(Duration::from_secs(10)),
            use_tls,
        }
    }

    fn detect_tls(addr: &str) -> bool {
        addr.to_lowercase().starts_with("https://")
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enable TLS, rewriting an `http://` address to `https://`.
    pub fn with_tls(mut self) -> Self {
        self.use_tls = true;
        if self.address.to_lowercase().starts_with("http://") {
            self.address = format!("https://{}", &self.address[7..]);
        }
        self
    }
}

/// Trim the address and add an `http://` scheme when none is given.
pub fn normalize_address(address: &str) -> String {
    let addr = address.trim();
    let lower = addr.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// Build a lazily connected channel.
///
/// Nothing is dialed until the first request, so the connection attempt
/// happens inside the caller's cancellable issuance call.
pub fn create_channel(config: &ChannelConfig) -> Result<Channel> {
    let mut endpoint = Endpoint::from_shared(config.address.clone())
        .map_err(|e| IssuanceError::InvalidAddress(e.to_string()))?;

    if config.use_tls {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new())
            .map_err(|e| IssuanceError::InvalidAddress(format!("TLS config error: {}", e)))?;
    }

    if let Some(timeout) = config.connect_timeout {
        endpoint = endpoint.connect_timeout(timeout);
    }

    tracing::debug!(
        address = %config.address,
        use_tls = config.use_tls,
        "certificate authority channel configured"
    );

    Ok(endpoint.connect_lazy())
}
