// ABOUTME: Single-use SSH credentials for one command session.
// ABOUTME: Orchestrates keypair, certificate, and encoding, then hands off to an SSH connector.

mod error;
mod orchestrator;
mod session;

pub use error::{CredentialError, CredentialPhase, SessionError};
pub use orchestrator::{CredentialOrchestrator, SingleUseCredential};
pub use session::{
    connect, run_command, CommandOutput, CommandRequest, SessionConnector, SessionHandoff,
    SessionTarget, DEFAULT_SSH_PORT, DEFAULT_SSH_USER, DEFAULT_TERM,
};
