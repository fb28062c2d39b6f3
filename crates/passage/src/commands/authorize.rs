//! `passage authorize` command implementation.

use clap::Args;
use passage_http::InboundRequest;
use passage_oauth::{AuthorizeOptions, MemoryTokenStore, OAuthFactory, ProviderId};

use super::{CommonArgs, OOB_URL, callback_request, transport};
use crate::error::CliError;
use crate::output::{Output, Status};

/// Arguments for the authorize command.
#[derive(Args)]
pub(crate) struct AuthorizeArgs {
    /// Provider: twitter, facebook or mixi3-legged.
    provider: String,

    /// Callback URL registered with the platform (Twitter defaults to a PIN).
    #[arg(long)]
    callback: Option<String>,

    /// Permission to request; repeat for several.
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Consumer key overriding the configured one.
    #[arg(long)]
    consumer_key: Option<String>,

    /// Consumer secret overriding the configured one.
    #[arg(long, env = "PASSAGE_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: Option<String>,

    #[command(flatten)]
    pub(crate) common: CommonArgs,
}

impl AuthorizeArgs {
    /// Run a 3-legged authorization round trip.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.common.load_config()?;

        let id: ProviderId = self.provider.parse()?;

        let factory = OAuthFactory::new(&config, transport(&config));
        let landing = InboundRequest::get(self.callback.as_deref().unwrap_or(OOB_URL));
        let mut provider = factory.create_with_credentials(
            id.as_str(),
            &landing,
            self.consumer_key.as_deref(),
            self.consumer_secret.as_deref(),
        )?;
        let Some(three_legged) = provider.three_legged_mut() else {
            return Err(CliError::Validation(format!(
                "{id} has no authorization step"
            )));
        };

        let mut options = AuthorizeOptions::new();
        if let Some(callback) = &self.callback {
            options = options.callback(callback.as_str());
        }
        for scope in &self.scopes {
            options = options.scope(scope.as_str());
        }

        let mut store = MemoryTokenStore::new();
        output.step(1, "Building the authorization URL...");
        let authorize_uri = three_legged.authorize_uri(&options, &mut store)?;

        output.section("Step 2: Authorization Required");
        output.info("\nPlease open this URL in your browser:");
        output.highlight(&format!("\n{authorize_uri}\n"));

        let input = output.prompt("Paste the URL you were redirected to (or the PIN): ")?;
        let request = callback_request(&input, id.as_str());

        if request.parameter("state").is_some_and(|state| state != id.as_str()) {
            return Err(CliError::Validation(
                "the callback URL belongs to another provider".to_owned(),
            ));
        }

        output.step(3, "Exchanging for access token...");
        three_legged.parse_access_token(&request, &mut store)?;
        let token = three_legged
            .access_token()
            .ok_or_else(|| CliError::Validation("no access token was issued".to_owned()))?;

        output.section("Authorization Successful!");
        output.status(Status::Ok, &format!("{id} access token issued"));
        output.info(&serde_json::to_string_pretty(token)?);
        Ok(())
    }
}
