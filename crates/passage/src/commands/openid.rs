//! `passage openid` command implementation.

use std::sync::Arc;

use clap::Args;
use passage_http::InboundRequest;
use passage_openid::{AttributeExchange, HttpOpenIdClient, OpenIdClient, OpenIdFactory};

use super::{CommonArgs, transport};
use crate::error::CliError;
use crate::output::{Output, Status};

/// Arguments for the openid command.
#[derive(Args)]
pub(crate) struct OpenIdArgs {
    /// Provider: google, flickr, yahoo, mixi, livedoor or excite.
    provider: String,

    /// Return URL the provider sends the browser back to.
    #[arg(long)]
    callback: String,

    /// AX attribute to request, e.g. contact/email; repeat for several.
    #[arg(long = "attribute")]
    attributes: Vec<String>,

    #[command(flatten)]
    pub(crate) common: CommonArgs,
}

impl OpenIdArgs {
    /// Run an OpenID login round trip.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.common.load_config()?;

        let client: Arc<dyn OpenIdClient> = Arc::new(HttpOpenIdClient::new(
            transport(&config),
            config.openid.realm.clone(),
        ));
        let factory = OpenIdFactory::new(client);

        let mut session = factory.create(&self.provider)?;
        session.set_attribute_exchange(
            self.attributes
                .iter()
                .fold(AttributeExchange::new(), |ax, name| ax.with_attribute(name.as_str())),
        );

        output.step(1, "Discovering the provider endpoint...");
        let uri = session.authenticate_uri(&self.callback)?;

        output.section("Step 2: Sign In Required");
        output.info("\nPlease open this URL in your browser:");
        output.highlight(&format!("\n{uri}\n"));

        let input = output.prompt("Paste the URL you were redirected to: ")?;
        output.step(3, "Verifying the assertion...");
        let Some(session) = factory.create_from_request(&InboundRequest::get(&input))? else {
            return Err(CliError::Validation(
                "the URL carries no OpenID response".to_owned(),
            ));
        };

        let Some(identity) = session.identity() else {
            output.status(Status::Fail, "Sign-in was cancelled or could not be verified");
            return Err(CliError::Validation("not authenticated".to_owned()));
        };

        output.section("Authentication Successful!");
        output.status(Status::Ok, &format!("signed in with {}", session.provider()));
        output.field("identity", identity);
        for (name, value) in session.attribute_exchange().values() {
            output.field(name, value);
        }
        Ok(())
    }
}
