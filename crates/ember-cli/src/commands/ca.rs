// ABOUTME: Implementation of 'ember ca' commands
// ABOUTME: Runs an in-memory certificate authority until Ctrl+C or SIGTERM

use anyhow::{Context, Result};
use ember_ca::{AuthorityService, LocalAuthority, ValidityWindow};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use super::CaCommand;
use crate::config::Settings;

pub async fn run(settings: &Settings, cmd: CaCommand) -> Result<()> {
    match cmd {
        CaCommand::Serve {
            listen,
            max_valid_hours,
        } => serve(settings, listen, max_valid_hours).await,
    }
}

async fn serve(settings: &Settings, listen: SocketAddr, max_valid_hours: u32) -> Result<()> {
    let max_validity =
        ValidityWindow::from_hours(max_valid_hours).context("invalid --max-valid-hours")?;
    let authority = LocalAuthority::new().with_max_validity(max_validity);
    let mut service = AuthorityService::new(Arc::new(authority));
    if let Some(token) = &settings.token {
        service = service.with_token(token.clone());
    }

    println!("Certificate authority listening on {}", listen);
    println!("Maximum certificate lifetime: {} hour(s)", max_validity.hours());
    if settings.token.is_none() {
        println!("No token configured; requests are not authenticated.");
    }

    ember_ca::serve(listen, service, shutdown_signal())
        .await
        .context("running certificate authority")?;

    println!("\nCertificate authority stopped.");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
