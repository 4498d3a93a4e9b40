// ABOUTME: Implementation of 'ember ssh' commands
// ABOUTME: Issues single-use credentials as JSON and establishes organization authorities

use anyhow::{bail, Context, Result};
use colored::Colorize;
use ember_ca::{AuthorityContext, ChannelConfig, GrpcIssuer};
use ember_session::{CredentialOrchestrator, SessionHandoff, SessionTarget, SingleUseCredential};
use tokio_util::sync::CancellationToken;

use super::SshCommand;
use crate::config::Settings;

pub async fn run(settings: &Settings, cmd: SshCommand) -> Result<()> {
    match cmd {
        SshCommand::Issue {
            org,
            host,
            port,
            user,
            comment,
        } => {
            let context = organization(org, settings)?;
            let target = host.map(|h| SessionTarget::new(h).with_port(port).with_user(user));
            issue(settings, context, target, comment).await
        }
        SshCommand::Establish { org, replace } => {
            let context = organization(org, settings)?;
            establish(settings, context, replace).await
        }
    }
}

fn organization(flag: Option<String>, settings: &Settings) -> Result<AuthorityContext> {
    let Some(org) = flag.or_else(|| settings.organization.clone()) else {
        bail!("Organization required. Use --org, set EMBER_ORG, or set it in the config file.");
    };
    AuthorityContext::new(org).context("invalid organization")
}

fn issuer(settings: &Settings) -> Result<GrpcIssuer> {
    let config = ChannelConfig::new(&settings.authority);
    GrpcIssuer::new(&config, settings.token.clone())
        .context("configuring certificate authority client")
}

async fn issue(
    settings: &Settings,
    context: AuthorityContext,
    target: Option<SessionTarget>,
    comment: Option<String>,
) -> Result<()> {
    let mut orchestrator =
        CredentialOrchestrator::new(issuer(settings)?).with_timeout(settings.timeout);
    if let Some(comment) = comment {
        orchestrator = orchestrator.with_comment(comment);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let credential = orchestrator
        .issue_single_use_credential(&context, &cancel)
        .await?;

    println!("{}", render_issue(credential, target)?);
    Ok(())
}

async fn establish(settings: &Settings, context: AuthorityContext, replace: bool) -> Result<()> {
    let ca_public_key = issuer(settings)?.establish(&context, replace).await?;

    let verb = if replace { "replaced" } else { "ready" };
    println!(
        "{}",
        format!("Certificate authority {} for {}", verb, context).green().bold()
    );
    println!();
    println!("{}", ca_public_key);
    Ok(())
}

/// Pretty JSON of the session handoff, or of the bare credential without a target.
pub fn render_issue(
    credential: SingleUseCredential,
    target: Option<SessionTarget>,
) -> Result<String> {
    let json = match target {
        Some(target) => serde_json::to_string_pretty(&SessionHandoff { target, credential }),
        None => serde_json::to_string_pretty(&credential),
    };
    json.context("serializing credential")
}
