//! `passage verify` command implementation.

use std::time::{Duration, SystemTime};

use clap::Args;
use passage_http::{InboundRequest, Method, UnsupportedMethod};
use passage_oauth::{Authorization, OAuthFactory, SignatureType};

use super::{CommonArgs, transport};
use crate::error::CliError;
use crate::output::{Output, Status};

/// Arguments for the verify command.
#[derive(Args)]
pub(crate) struct VerifyArgs {
    /// Signature format: hmac, rsa-pc, rsa-touch, rsa-photo-upload or
    /// rsa-lifecycle-event.
    #[arg(short = 't', long)]
    signature_type: String,

    /// Full request URL including the query string.
    #[arg(short, long)]
    url: String,

    /// HTTP method of the request.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header as `Name: value`; repeat for several.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Form field as `name=value`; repeat for several.
    #[arg(short = 'f', long = "form")]
    form: Vec<String>,

    /// Judge certificate expiry at this Unix time instead of now.
    #[arg(long)]
    at: Option<u64>,

    #[command(flatten)]
    pub(crate) common: CommonArgs,
}

impl VerifyArgs {
    /// Verify a mixi-signed request described on the command line.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.common.load_config()?;

        let signature_type: SignatureType = self.signature_type.parse()?;
        let request = self.inbound_request()?;

        let factory = OAuthFactory::new(&config, transport(&config));
        let provider = factory.create("mixi2-legged", &request)?;
        let Some(mixi) = provider.mixi_app() else {
            return Err(CliError::Validation(
                "mixi application provider is not available".to_owned(),
            ));
        };

        let now = self.at.map_or_else(SystemTime::now, |secs| {
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
        });
        match mixi.is_authorized_at(signature_type, &request, now)? {
            Authorization::Authorized => {
                output.status(Status::Ok, &format!("{signature_type} signature verified"));
                Ok(())
            }
            Authorization::NotAuthorized(rejection) => {
                output.status(
                    Status::Fail,
                    &format!("{signature_type} signature rejected: {rejection}"),
                );
                Err(CliError::NotAuthorized(rejection))
            }
        }
    }

    fn inbound_request(&self) -> Result<InboundRequest, CliError> {
        let method: Method = self
            .method
            .parse()
            .map_err(|e: UnsupportedMethod| CliError::Validation(e.to_string()))?;
        let mut request = InboundRequest::new(method, &self.url);

        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            request = request.with_header(name, value);
        }
        for field in &self.form {
            let (name, value) = field.split_once('=').ok_or_else(|| {
                CliError::Validation(format!("form field must be name=value: {field}"))
            })?;
            request = request.with_form(name, value);
        }
        Ok(request)
    }
}

fn parse_header(header: &str) -> Result<(&str, &str), CliError> {
    header
        .split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::Validation(format!("header must be 'Name: value': {header}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: OAuth oauth_nonce=\"a:b\"").unwrap(),
            ("Authorization", "OAuth oauth_nonce=\"a:b\"")
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
    }
}
