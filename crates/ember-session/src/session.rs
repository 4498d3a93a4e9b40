// ABOUTME: Hands a single-use credential to the SSH session layer.
// ABOUTME: Defines the target, command types, and the connector seam for running remote commands.

use async_trait::async_trait;
use ember_ca::{AuthorityContext, CertificateIssuer};
use rand::{CryptoRng, RngCore};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::orchestrator::{CredentialOrchestrator, SingleUseCredential};

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_TERM: &str = "xterm";

/// Host the credential will be presented to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl SessionTarget {
    /// Target on port 22 as `root`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: DEFAULT_SSH_USER.to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// `host:port`, with IPv6 literals in brackets.
    pub fn address(&self) -> String {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl Serialize for SessionTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SessionTarget", 4)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("port", &self.port)?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field("address", &self.address())?;
        state.end()
    }
}

/// Everything the session layer needs to authenticate once.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHandoff {
    pub target: SessionTarget,
    pub credential: SingleUseCredential,
}

/// What to run once connected. An empty command opens a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub term: String,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
            term: DEFAULT_TERM.to_string(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Bridge to an SSH client implementation.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Authenticate with the handoff's credential and run `request`.
    async fn run(
        &self,
        handoff: &SessionHandoff,
        request: &CommandRequest,
    ) -> Result<CommandOutput, SessionError>;
}

/// Issue a fresh credential and run `request` on `target` with it.
///
/// The credential is dropped when this returns.
pub async fn connect<I, R, C>(
    orchestrator: &CredentialOrchestrator<I, R>,
    connector: &C,
    context: &AuthorityContext,
    target: SessionTarget,
    request: &CommandRequest,
    cancel: &CancellationToken,
) -> Result<CommandOutput, SessionError>
where
    I: CertificateIssuer,
    R: RngCore + CryptoRng + Send,
    C: SessionConnector + ?Sized,
{
    let credential = orchestrator
        .issue_single_use_credential(context, cancel)
        .await?;

    info!(
        address = %target.address(),
        user = %target.user,
        fingerprint = %credential.fingerprint(),
        "connecting with single-use credential"
    );
    let handoff = SessionHandoff { target, credential };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("session cancelled");
            Err(SessionError::Cancelled)
        }
        result = connector.run(&handoff, request) => result,
    }
}

/// Run a non-interactive command and return its stdout.
///
/// # Errors
/// Any output on stderr is treated as failure and returned as
/// `SessionError::Remote`.
pub async fn run_command<I, R, C>(
    orchestrator: &CredentialOrchestrator<I, R>,
    connector: &C,
    context: &AuthorityContext,
    target: SessionTarget,
    request: &CommandRequest,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, SessionError>
where
    I: CertificateIssuer,
    R: RngCore + CryptoRng + Send,
    C: SessionConnector + ?Sized,
{
    let output = connect(orchestrator, connector, context, target, request, cancel).await?;

    if !output.stderr.is_empty() {
        return Err(SessionError::Remote(
            String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        ));
    }
    Ok(output.stdout)
}
