//! CLI command implementations.

pub(crate) mod authorize;
pub(crate) mod certificates;
pub(crate) mod openid;
pub(crate) mod verify;

pub(crate) use authorize::AuthorizeArgs;
pub(crate) use certificates::CertificatesArgs;
pub(crate) use openid::OpenIdArgs;
pub(crate) use verify::VerifyArgs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use passage_config::{CliSettings, Config};
use passage_http::{HttpTransport, InboundRequest, UreqTransport};
use tracing::info;

use crate::error::CliError;

/// Stand-in callback URL for out-of-band (PIN) authorization.
pub(crate) const OOB_URL: &str = "http://localhost/";

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct CommonArgs {
    /// Path to configuration file (default: auto-discover passage.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP timeout in seconds.
    #[arg(long, env = "PASSAGE_TIMEOUT")]
    timeout: Option<u64>,

    /// User-Agent sent to platforms.
    #[arg(long)]
    user_agent: Option<String>,

    /// Enable verbose output (show INFO-level logs).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl CommonArgs {
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let settings = CliSettings {
            timeout_secs: self.timeout,
            user_agent: self.user_agent.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&settings))?;
        match &config.config_path {
            Some(path) => info!(path = %path.display(), "Loaded configuration"),
            None => info!("No configuration file found, using defaults"),
        }
        Ok(config)
    }
}

pub(crate) fn transport(config: &Config) -> Arc<dyn HttpTransport> {
    Arc::new(UreqTransport::new(
        Duration::from_secs(config.http.timeout_secs),
        &config.http.user_agent,
    ))
}

/// Request the browser landed on: a pasted URL, or a bare verifier code
/// completing an out-of-band flow.
pub(crate) fn callback_request(input: &str, provider: &str) -> InboundRequest {
    if input.starts_with("http://") || input.starts_with("https://") {
        InboundRequest::get(input)
    } else {
        InboundRequest::get(OOB_URL)
            .with_query("state", provider)
            .with_query("oauth_verifier", input)
    }
}
