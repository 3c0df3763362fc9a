//! CLI entry point for loginflow.
//!
//! This binary provides the `loginflow` command with subcommands for the
//! interactive sign-in, printing an authorization URL, and probing the
//! token exchange intermediary.

mod cli;
mod helpers;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use loginflow_auth::{
    AuthFlowController, EmailDomainValidator, ErrorKind, FlowObserver, FlowState,
    SystemBrowserLauncher, TokenExchangeClient, TokioScheduler, authorization_url,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::helpers::{Action, Input, init_tracing, load_config, parse_input, route};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Commands::Login { email, print_token } => cmd_login(&cli.config, email, print_token).await,
        Commands::AuthUrl { email } => cmd_auth_url(&cli.config, &email),
        Commands::Health => cmd_health(&cli.config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: login
// ---------------------------------------------------------------------------

/// Prints prompts as the flow moves between screens.
struct TerminalObserver;

impl FlowObserver for TerminalObserver {
    fn state_changed(&self, _from: FlowState, to: FlowState) {
        match to {
            FlowState::Login => println!("Enter your email address ('quit' to exit):"),
            FlowState::Authenticating => {
                println!("Opening the sign-in window. Finish signing in there ('back' to cancel).");
            }
            FlowState::Troubleshooting => {
                println!("No response from the sign-in window.");
                println!("After signing in, copy the full URL from the browser's address bar.");
            }
            FlowState::Success => {}
        }
    }

    fn focus_url_input(&self) {
        print!("Paste the redirect URL ('back' to start over): ");
        let _ = std::io::stdout().flush();
    }
}

async fn cmd_login(config_path: &Path, email: Option<String>, print_token: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let exchanger = TokenExchangeClient::new(&config.oauth.token_exchange_endpoint)
        .context("failed to create token exchange client")?;
    let (scheduler, mut fired) = TokioScheduler::new();

    let mut flow = AuthFlowController::new(
        config,
        Arc::new(scheduler),
        Arc::new(SystemBrowserLauncher),
        Arc::new(exchanger),
    )
    .context("invalid flow configuration")?
    .with_observer(Arc::new(TerminalObserver));

    println!();
    println!("  loginflow v{}", env!("CARGO_PKG_VERSION"));
    println!();

    match email {
        Some(email) => dispatch(&mut flow, Input::Text(email)).await,
        None => println!("Enter your email address ('quit' to exit):"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(timer) = fired.recv() => flow.handle_timer(timer),
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    bail!("input closed before sign-in completed");
                };
                let Some(input) = parse_input(&line) else {
                    continue;
                };
                if input == Input::Quit {
                    info!("user requested exit");
                    return Ok(());
                }
                dispatch(&mut flow, input).await;
            }
        }

        if flow.state() == FlowState::Success {
            break;
        }
    }

    println!();
    println!("Signed in as {}", flow.resolved_email().unwrap_or_default());
    if print_token && let Some(token) = flow.access_token() {
        println!("{token}");
    }
    Ok(())
}

/// Route one input line to the action the current screen accepts.
async fn dispatch(flow: &mut AuthFlowController, input: Input) {
    let result = match route(input, flow.state()) {
        None => Ok(()),
        Some(Action::Back) => {
            flow.back();
            Ok(())
        }
        Some(Action::Restart) => flow.restart(),
        Some(Action::SubmitRedirect(url)) => flow.submit_pasted_url(&url).await,
        Some(Action::SubmitEmail(email)) => {
            let result = flow.submit_email(&email);
            if result.is_ok()
                && let Some(url) = flow.authorization_url()
            {
                println!("If no window opens, visit:\n  {url}");
            }
            result
        }
    };

    if let Err(e) = result {
        match e.kind() {
            ErrorKind::Flow => println!("  ! {e}"),
            _ => println!("  ! {}", e.user_message()),
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: auth-url
// ---------------------------------------------------------------------------

fn cmd_auth_url(config_path: &Path, email: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let email = email.trim();

    EmailDomainValidator::new(config.allowed_domains.clone())
        .check(email)
        .context("email rejected")?;
    let url = authorization_url(&config.oauth, email).context("failed to build authorization URL")?;

    println!("{url}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: health
// ---------------------------------------------------------------------------

async fn cmd_health(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let client = TokenExchangeClient::new(&config.oauth.token_exchange_endpoint)
        .context("failed to create token exchange client")?;

    let healthy = client
        .health()
        .await
        .with_context(|| format!("cannot reach {}", client.health_url()))?;

    if !healthy {
        bail!("{} did not report OK", client.health_url());
    }
    println!("ok: {}", client.health_url());
    Ok(())
}
