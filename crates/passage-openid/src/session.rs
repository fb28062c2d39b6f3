//! One OpenID authentication handshake.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use passage_http::{InboundRequest, append_query};

use crate::attributes::AttributeExchange;
use crate::client::OpenIdClient;
use crate::error::OpenIdError;

/// Callback parameter naming the provider a response belongs to.
pub const PROVIDER_PARAMETER: &str = "openid_provider";

/// OpenID login against one provider.
pub struct OpenIdSession {
    provider: String,
    identifier: String,
    client: Arc<dyn OpenIdClient>,
    attribute_exchange: AttributeExchange,
    identity: Option<String>,
}

impl fmt::Debug for OpenIdSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenIdSession")
            .field("provider", &self.provider)
            .field("identifier", &self.identifier)
            .field("attribute_exchange", &self.attribute_exchange)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl OpenIdSession {
    pub fn new(
        provider: impl Into<String>,
        identifier: impl Into<String>,
        client: Arc<dyn OpenIdClient>,
    ) -> Self {
        Self {
            provider: provider.into(),
            identifier: identifier.into(),
            client,
            attribute_exchange: AttributeExchange::new(),
            identity: None,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// OP identifier discovery starts from.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn set_attribute_exchange(&mut self, attribute_exchange: AttributeExchange) {
        self.attribute_exchange = attribute_exchange;
    }

    /// Requested attributes before authentication, returned values after
    /// [`receive_data`](Self::receive_data).
    #[must_use]
    pub fn attribute_exchange(&self) -> &AttributeExchange {
        &self.attribute_exchange
    }

    /// URL to send the user to.
    ///
    /// The provider returns to `callback` with `openid_provider=<provider>`
    /// appended so the response can be routed back to this provider.
    pub fn authenticate_uri(&self, callback: &str) -> Result<String, OpenIdError> {
        let return_url = append_query(
            callback,
            &[(PROVIDER_PARAMETER.to_owned(), self.provider.clone())],
        );
        self.client.auth_url(
            &self.identifier,
            &return_url,
            self.attribute_exchange.required(),
        )
    }

    /// Read the provider's response.
    ///
    /// Returns `false` when the request carries no OpenID response. A
    /// cancelled or unverifiable response returns `true` and leaves the
    /// session unauthenticated.
    pub fn receive_data(&mut self, request: &InboundRequest) -> Result<bool, OpenIdError> {
        self.attribute_exchange = self.client.attributes(request);

        let Some(mode) = request
            .parameter("openid.mode")
            .or_else(|| request.parameter("openid_mode"))
            .filter(|mode| !mode.is_empty())
        else {
            return Ok(false);
        };

        if mode != "cancel" && self.client.validate(request)? {
            self.identity = request
                .parameter("openid.claimed_id")
                .or_else(|| request.parameter("openid.identity"))
                .map(str::to_owned);
            info!(provider = %self.provider, identity = ?self.identity, "OpenID assertion verified");
        }
        Ok(true)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Verified identifier of the user.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}
