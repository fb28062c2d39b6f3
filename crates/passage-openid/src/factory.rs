//! OpenID session construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use passage_http::InboundRequest;

use crate::client::OpenIdClient;
use crate::error::OpenIdError;
use crate::session::{OpenIdSession, PROVIDER_PARAMETER};

/// Supported OpenID providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenIdProvider {
    Google,
    Flickr,
    /// Yahoo! JAPAN.
    Yahoo,
    Mixi,
    Livedoor,
    Excite,
}

impl OpenIdProvider {
    pub const ALL: [Self; 6] = [
        Self::Google,
        Self::Flickr,
        Self::Yahoo,
        Self::Mixi,
        Self::Livedoor,
        Self::Excite,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Flickr => "flickr",
            Self::Yahoo => "yahoo",
            Self::Mixi => "mixi",
            Self::Livedoor => "livedoor",
            Self::Excite => "excite",
        }
    }

    /// OP identifier discovery starts from.
    #[must_use]
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/accounts/o8/id",
            Self::Flickr => "http://flickr.com",
            Self::Yahoo => "http://yahoo.co.jp",
            Self::Mixi => "https://mixi.jp",
            Self::Livedoor => "http://livedoor.com",
            Self::Excite => "https://openid.excite.co.jp",
        }
    }
}

impl fmt::Display for OpenIdProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenIdProvider {
    type Err = OpenIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| OpenIdError::UnsupportedProvider(s.to_owned()))
    }
}

/// Builds [`OpenIdSession`]s sharing one [`OpenIdClient`].
pub struct OpenIdFactory {
    client: Arc<dyn OpenIdClient>,
}

impl OpenIdFactory {
    pub fn new(client: Arc<dyn OpenIdClient>) -> Self {
        Self { client }
    }

    /// Start a session for a named provider.
    pub fn create(&self, provider: &str) -> Result<OpenIdSession, OpenIdError> {
        let provider: OpenIdProvider = provider.parse()?;
        Ok(OpenIdSession::new(
            provider.as_str(),
            provider.identifier(),
            Arc::clone(&self.client),
        ))
    }

    /// Resume the session a provider response belongs to.
    ///
    /// Returns `Ok(None)` when the request names no supported provider or
    /// carries no OpenID response.
    pub fn create_from_request(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<OpenIdSession>, OpenIdError> {
        let Some(provider) = request
            .parameter(PROVIDER_PARAMETER)
            .filter(|p| !p.is_empty())
        else {
            return Ok(None);
        };
        let mut session = match self.create(provider) {
            Ok(session) => session,
            Err(OpenIdError::UnsupportedProvider(_)) => {
                debug!(provider, "OpenID response names no supported provider");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if !session.receive_data(request)? {
            return Ok(None);
        }
        Ok(Some(session))
    }
}
