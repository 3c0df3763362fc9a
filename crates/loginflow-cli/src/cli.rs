//! CLI argument definitions for loginflow.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// loginflow -- email-gated OAuth sign-in from the terminal.
#[derive(Parser)]
#[command(
    name = "loginflow",
    version,
    about = "loginflow -- email-gated OAuth sign-in",
    long_about = "Opens the identity provider's sign-in page for an allowed email address, \
                  falls back to pasting the redirect URL, and resolves the signed-in identity."
)]
pub struct Cli {
    /// Path to the flow configuration file.
    #[arg(long, short, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Default log level when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the interactive sign-in.
    Login {
        /// Email to submit right away instead of prompting.
        #[arg(long, short)]
        email: Option<String>,

        /// Print the access token after a successful sign-in.
        #[arg(long)]
        print_token: bool,
    },

    /// Print the authorization URL for an email without opening it.
    AuthUrl {
        /// Email used as the login hint.
        #[arg(long, short)]
        email: String,
    },

    /// Check that the token exchange intermediary is reachable.
    Health,
}
