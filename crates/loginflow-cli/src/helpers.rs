//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, configuration loading with environment
//! overrides, and routing of interactive input lines to flow actions.

use std::path::Path;

use anyhow::{Context, Result};
use loginflow_auth::{FlowConfig, FlowState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable that replaces the configured exchange endpoint.
pub const EXCHANGE_ENDPOINT_ENV: &str = "LOGINFLOW_EXCHANGE_ENDPOINT";

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so prompts on stdout stay readable.
pub fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load the flow configuration and apply environment overrides.
pub fn load_config(path: &Path) -> Result<FlowConfig> {
    let config = FlowConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    let config = apply_overrides(config, std::env::var(EXCHANGE_ENDPOINT_ENV).ok())?;
    info!(
        path = %path.display(),
        exchange_endpoint = %config.oauth.token_exchange_endpoint,
        "configuration loaded"
    );
    Ok(config)
}

/// Apply an exchange endpoint override, re-validating the result.
pub fn apply_overrides(
    config: FlowConfig,
    exchange_endpoint: Option<String>,
) -> Result<FlowConfig> {
    let Some(endpoint) = exchange_endpoint.filter(|e| !e.trim().is_empty()) else {
        return Ok(config);
    };

    let config = config.with_exchange_endpoint(endpoint.trim());
    config
        .validate()
        .with_context(|| format!("invalid {EXCHANGE_ENDPOINT_ENV}"))?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Interactive input
// ---------------------------------------------------------------------------

/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Quit,
    Back,
    Restart,
    Text(String),
}

/// Classify an input line. Returns `None` for blank lines.
pub fn parse_input(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    match trimmed {
        "" => None,
        "quit" | "exit" => Some(Input::Quit),
        "back" => Some(Input::Back),
        "restart" => Some(Input::Restart),
        other => Some(Input::Text(other.to_string())),
    }
}

/// A controller action requested from the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Back,
    Restart,
    SubmitEmail(String),
    SubmitRedirect(String),
}

/// Decide what `input` means on the screen for `state`.
///
/// Free text is a redirect URL while troubleshooting and an email
/// everywhere else. `Quit` maps to `None`; the caller ends the session.
pub fn route(input: Input, state: FlowState) -> Option<Action> {
    match (input, state) {
        (Input::Quit, _) => None,
        (Input::Back, _) => Some(Action::Back),
        (Input::Restart, _) => Some(Action::Restart),
        (Input::Text(url), FlowState::Troubleshooting) => Some(Action::SubmitRedirect(url)),
        (Input::Text(email), _) => Some(Action::SubmitEmail(email)),
    }
}
