//! passage CLI - OAuth and OpenID sign-in toolkit.
//!
//! Provides commands for:
//! - `authorize`: Run a 3-legged OAuth handshake and print the access token
//! - `verify`: Check the signature of a request sent by mixi
//! - `certificates`: List the certificates RSA signatures are checked against
//! - `openid`: Run an OpenID login and print the verified identity

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{AuthorizeArgs, CertificatesArgs, OpenIdArgs, VerifyArgs};
use output::Output;

/// passage - OAuth and OpenID sign-in toolkit.
#[derive(Parser)]
#[command(name = "passage", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain an access token from Twitter, Facebook or mixi.
    Authorize(AuthorizeArgs),
    /// Verify a signed request from a mixi application.
    Verify(VerifyArgs),
    /// Show the mixi signature certificates in use.
    Certificates(CertificatesArgs),
    /// Sign in with an OpenID provider.
    Openid(OpenIdArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Authorize(args) => args.common.verbose,
            Self::Verify(args) => args.common.verbose,
            Self::Certificates(args) => args.common.verbose,
            Self::Openid(args) => args.common.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Authorize(args) => args.execute(),
        Commands::Verify(args) => args.execute(),
        Commands::Certificates(args) => args.execute(),
        Commands::Openid(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
