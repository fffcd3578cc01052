//! Command-line interface for the gateway.

pub mod login;

use clap::{Parser, Subcommand};

/// Octogate CLI
#[derive(Parser, Debug)]
#[command(
    name = "octogate",
    version,
    about = "GitHub OAuth gateway: web redirect and device authorization flows"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP facade
    Serve(ServeArgs),
    /// Log in from this terminal via the device flow
    Login(LoginArgs),
}

/// Arguments for `octogate serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for `octogate login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// OAuth scope to request (defaults to OAUTH_SCOPE, then "read:user user:email")
    #[arg(short, long)]
    pub scope: Option<String>,
}
