//! Provider construction from configuration and inbound requests.

use std::sync::Arc;

use tracing::{debug, info};

use passage_config::{Config, CredentialsConfig, MixiAppConfig};
use passage_http::{HttpTransport, InboundRequest};

use crate::certs::CertificateSet;
use crate::error::OAuthError;
use crate::providers::{
    FacebookProvider, MixiAppProvider, MixiGraphProvider, Provider, ProviderId, TwitterProvider,
};
use crate::store::TokenStore;
use crate::token::ConsumerCredentials;

/// Query or form parameter carrying the provider ID on authorization
/// callbacks.
const STATE_PARAMETER: &str = "state";

/// Builds [`Provider`]s from configured credentials.
pub struct OAuthFactory {
    twitter: Option<CredentialsConfig>,
    facebook: Option<CredentialsConfig>,
    mixi_graph: Option<CredentialsConfig>,
    mixi: Option<MixiAppConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl OAuthFactory {
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            twitter: config.twitter.clone(),
            facebook: config.facebook.clone(),
            mixi_graph: config.mixi_graph.clone(),
            mixi: config.mixi.clone(),
            transport,
        }
    }

    /// Create a provider using configured credentials.
    pub fn create(&self, provider: &str, request: &InboundRequest) -> Result<Provider, OAuthError> {
        self.create_with_credentials(provider, request, None, None)
    }

    /// Create a provider; `key` and `secret` override configured values.
    pub fn create_with_credentials(
        &self,
        provider: &str,
        request: &InboundRequest,
        key: Option<&str>,
        secret: Option<&str>,
    ) -> Result<Provider, OAuthError> {
        let id: ProviderId = provider.parse()?;
        let transport = Arc::clone(&self.transport);

        let provider = match id {
            ProviderId::Twitter => Provider::Twitter(TwitterProvider::new(
                ConsumerCredentials::resolve(key, secret, self.twitter.as_ref())?,
                transport,
            )),
            ProviderId::Facebook => Provider::Facebook(FacebookProvider::new(
                ConsumerCredentials::resolve(key, secret, self.facebook.as_ref())?,
                transport,
            )),
            ProviderId::MixiGraph => Provider::MixiGraph(MixiGraphProvider::new(
                ConsumerCredentials::resolve(key, secret, self.mixi_graph.as_ref())?,
                transport,
                request.device(),
            )),
            ProviderId::MixiApp => {
                let mixi = self.mixi.clone().unwrap_or_default();
                let credentials =
                    ConsumerCredentials::resolve(key, secret, Some(&mixi.credentials()))?;
                let certificates = CertificateSet::load(&mixi.certificates)?;
                let requestor_id = request
                    .parameter("opensocial_owner_id")
                    .map(str::to_owned)
                    .or(mixi.debug_owner_id);
                Provider::MixiApp(
                    MixiAppProvider::new(credentials, transport, certificates)
                        .allow_expired_certificates(mixi.allow_expired_certificates)
                        .with_requestor_id(requestor_id),
                )
            }
        };
        debug!(provider = %id, "Created OAuth provider");
        Ok(provider)
    }

    /// Complete an authorization callback.
    ///
    /// The provider is picked from the `state` parameter. Requests that are
    /// not callbacks of a 3-legged provider yield `Ok(None)`. On success the
    /// access token is saved to `store`.
    pub fn create_from_request(
        &self,
        request: &InboundRequest,
        store: &mut dyn TokenStore,
    ) -> Result<Option<Provider>, OAuthError> {
        let Some(state) = request.parameter(STATE_PARAMETER).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let Ok(id) = state.parse::<ProviderId>() else {
            debug!(state, "Callback state names no provider");
            return Ok(None);
        };
        if !id.is_three_legged() {
            return Ok(None);
        }

        let mut provider = self.create(id.as_str(), request)?;
        let Some(three_legged) = provider.three_legged_mut() else {
            return Ok(None);
        };
        three_legged.parse_access_token(request, store)?;
        three_legged.save_access_token(store)?;
        info!(provider = %id, "Authorization callback completed");
        Ok(Some(provider))
    }

    /// Create a provider and restore a previously saved access token.
    pub fn restore(
        &self,
        provider: &str,
        request: &InboundRequest,
        store: &dyn TokenStore,
    ) -> Result<Provider, OAuthError> {
        let mut provider = self.create(provider, request)?;
        if let Some(three_legged) = provider.three_legged_mut() {
            three_legged.restore_access_token(store)?;
        }
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use passage_config::CertificatePaths;
    use passage_http::{HttpResponse, MockTransport};

    use crate::providers::OAuthProvider;
    use crate::store::MemoryTokenStore;

    fn credentials(key: &str, secret: &str) -> Option<CredentialsConfig> {
        Some(CredentialsConfig {
            consumer_key: Some(key.to_owned()),
            consumer_secret: Some(secret.to_owned()),
        })
    }

    fn config() -> Config {
        Config {
            twitter: credentials("tw-key", "tw-secret"),
            facebook: credentials("fb-id", "fb-secret"),
            mixi_graph: credentials("mg-id", "mg-secret"),
            mixi: Some(MixiAppConfig {
                consumer_key: Some("mixi-key".to_owned()),
                consumer_secret: Some("mixi-secret".to_owned()),
                allow_expired_certificates: false,
                debug_owner_id: Some("debug-owner".to_owned()),
                certificates: CertificatePaths::default(),
            }),
            ..Config::default()
        }
    }

    fn factory(transport: &Arc<MockTransport>) -> OAuthFactory {
        OAuthFactory::new(&config(), Arc::clone(transport) as Arc<dyn HttpTransport>)
    }

    #[test]
    fn test_create_each_provider() {
        let factory = factory(&Arc::new(MockTransport::new()));
        let request = InboundRequest::get("https://app.example/");

        for id in ProviderId::ALL {
            let provider = factory.create(id.as_str(), &request).unwrap();
            assert_eq!(provider.provider_id(), id);
        }
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let factory = factory(&Arc::new(MockTransport::new()));
        let err = factory
            .create("myspace", &InboundRequest::get("https://app.example/"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "The specified provider is not supported. [myspace]"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let factory = OAuthFactory::new(
            &Config::default(),
            Arc::new(MockTransport::new()) as Arc<dyn HttpTransport>,
        );
        let request = InboundRequest::get("https://app.example/");

        let err = factory.create("twitter", &request).unwrap_err();
        assert_eq!(err.to_string(), "Consumer key is undefined.");

        let provider = factory
            .create_with_credentials("twitter", &request, Some("k"), Some("s"))
            .unwrap();
        assert_eq!(provider.provider_id(), ProviderId::Twitter);
    }

    #[test]
    fn test_mixi_app_requestor_id() {
        let factory = factory(&Arc::new(MockTransport::new()));

        let from_request = factory
            .create(
                "mixi2-legged",
                &InboundRequest::get("https://app.example/?opensocial_owner_id=5678"),
            )
            .unwrap();
        assert_eq!(
            from_request.mixi_app().unwrap().requestor_id(),
            Some("5678")
        );

        let fallback = factory
            .create("mixi2-legged", &InboundRequest::get("https://app.example/"))
            .unwrap();
        assert_eq!(
            fallback.mixi_app().unwrap().requestor_id(),
            Some("debug-owner")
        );
    }

    #[test]
    fn test_mixi_app_missing_certificate_file() {
        let mut config = config();
        if let Some(mixi) = config.mixi.as_mut() {
            mixi.certificates.pc = Some("/nonexistent/pc.pem".into());
        }
        let factory = OAuthFactory::new(
            &config,
            Arc::new(MockTransport::new()) as Arc<dyn HttpTransport>,
        );

        let err = factory
            .create("mixi2-legged", &InboundRequest::get("https://app.example/"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("/nonexistent/pc.pem"));
    }

    #[test]
    fn test_create_from_request_ignores_non_callbacks() {
        let transport = Arc::new(MockTransport::new());
        let factory = factory(&transport);
        let mut store = MemoryTokenStore::new();

        for url in [
            "https://app.example/",
            "https://app.example/?state=",
            "https://app.example/?state=myspace",
            "https://app.example/?state=mixi2-legged",
        ] {
            let provider = factory
                .create_from_request(&InboundRequest::get(url), &mut store)
                .unwrap();
            assert!(provider.is_none(), "{url}");
        }
        assert!(transport.requests().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_from_request_saves_token() {
        let transport = Arc::new(MockTransport::new().with_response(HttpResponse::json_body(
            200,
            &serde_json::json!({"access_token": "fb-token", "expires_in": 3600}),
        )));
        let factory = factory(&transport);
        let mut store = MemoryTokenStore::new();

        let provider = factory
            .create_from_request(
                &InboundRequest::get("https://app.example/cb?code=abc&state=facebook"),
                &mut store,
            )
            .unwrap()
            .unwrap();

        assert_eq!(provider.provider_id(), ProviderId::Facebook);
        assert!(store.get("facebook.access_token").is_some());

        let restored = factory
            .restore("facebook", &InboundRequest::get("https://app.example/"), &store)
            .unwrap();
        let token = restored.three_legged().unwrap().access_token().unwrap();
        assert_eq!(token.token, "fb-token");
    }

    #[test]
    fn test_create_from_request_propagates_failures() {
        let transport = Arc::new(MockTransport::new().with_response(HttpResponse::json_body(
            400,
            &serde_json::json!({"error": "invalid_grant"}),
        )));
        let factory = factory(&transport);
        let mut store = MemoryTokenStore::new();

        let err = factory
            .create_from_request(
                &InboundRequest::get("https://app.example/cb?code=bad&state=mixi3-legged"),
                &mut store,
            )
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to obtain an access token. [invalid_grant]"
        );
        assert!(store.is_empty());
    }
}
