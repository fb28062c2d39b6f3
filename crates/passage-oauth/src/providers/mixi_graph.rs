//! mixi Graph API (OAuth 2, 3-legged).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use passage_http::{
    Body, ClientDevice, HttpRequest, HttpResponse, HttpTransport, InboundRequest, Method,
    append_query,
};

use super::{
    ApiRequest, AuthorizeOptions, OAuthProvider, ProviderId, ThreeLeggedProvider, json_parameters,
    response_error, token_not_set,
};
use crate::error::OAuthError;
use crate::store::TokenStore;
use crate::token::{AccessToken, ConsumerCredentials, json_fields};

const ENDPOINT_AUTH_URI: &str = "https://mixi.jp/connect_authorize.pl";
const ENDPOINT_AUTH_URI_MOBILE: &str = "http://m.mixi.jp/connect_authorize.pl";
const ENDPOINT_TOKEN_URI: &str = "https://secure.mixi-platform.com/2/token";
const ENDPOINT_BASE_URI: &str = "http://api.mixi-platform.com";

/// mixi Graph API provider.
///
/// The authorization page depends on the device the user is browsing with.
pub struct MixiGraphProvider {
    credentials: ConsumerCredentials,
    transport: Arc<dyn HttpTransport>,
    device: ClientDevice,
    access_token: Option<AccessToken>,
}

impl fmt::Debug for MixiGraphProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixiGraphProvider")
            .field("client_id", &self.credentials.key())
            .field("device", &self.device)
            .field("authorized", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl MixiGraphProvider {
    pub fn new(
        credentials: ConsumerCredentials,
        transport: Arc<dyn HttpTransport>,
        device: ClientDevice,
    ) -> Self {
        Self {
            credentials,
            transport,
            device,
            access_token: None,
        }
    }

    /// POST to the token endpoint and return the response fields.
    ///
    /// Platform refusals are reported as `"<failure> [<error>]"`.
    fn request_token(
        &self,
        mut grant: Vec<(String, String)>,
        failure: &str,
    ) -> Result<BTreeMap<String, String>, OAuthError> {
        grant.push(("client_id".to_owned(), self.credentials.key().to_owned()));
        grant.push((
            "client_secret".to_owned(),
            self.credentials.secret().to_owned(),
        ));
        let request = HttpRequest::new(Method::Post, ENDPOINT_TOKEN_URI).body(Body::Form(grant));
        let response = self.transport.execute(&request)?;

        let fields = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|value| json_fields(&value))
            .unwrap_or_default();
        if let Some(error) = fields.get("error") {
            return Err(response_error(format!("{failure} [{error}]"), &response));
        }
        if !response.is_ok() || !fields.contains_key("access_token") {
            return Err(response_error(
                format!("{failure} [{}]", response.status),
                &response,
            ));
        }
        Ok(fields)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// On success the current token is replaced and the raw response fields
    /// are returned; on failure the current token is left untouched.
    pub fn reissue_access_token(
        &mut self,
        refresh_token: &str,
    ) -> Result<BTreeMap<String, String>, OAuthError> {
        let grant = vec![
            ("grant_type".to_owned(), "refresh_token".to_owned()),
            ("refresh_token".to_owned(), refresh_token.to_owned()),
        ];
        let fields = self.request_token(grant, "Failed to re-issue of the access token.")?;
        let token = AccessToken::from_oauth2_fields(fields.clone())
            .ok_or_else(|| OAuthError::Parse("access_token missing".to_owned()))?;
        info!("Re-issued mixi Graph access token");
        self.access_token = Some(token);
        Ok(fields)
    }

    fn send_error_detail(response: &HttpResponse) -> String {
        if response.is_json() {
            let fields = response
                .json::<serde_json::Value>()
                .ok()
                .and_then(|value| json_fields(&value))
                .unwrap_or_default();
            let field = |name: &str| fields.get(name).map_or("", String::as_str);
            format!("{} ({})", field("error"), field("error_description"))
        } else {
            response
                .header("WWW-Authenticate")
                .unwrap_or_default()
                .to_owned()
        }
    }
}

impl OAuthProvider for MixiGraphProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::MixiGraph
    }

    fn endpoint_base_uri(&self) -> &str {
        ENDPOINT_BASE_URI
    }

    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError> {
        let token = self.access_token.as_ref().ok_or_else(token_not_set)?;
        let url = self.endpoint_uri(&request.uri);

        let http_request = if request.method.has_body() {
            HttpRequest::new(request.method, url)
                .body(Body::Json(json_parameters(&request.parameters)))
        } else {
            HttpRequest::new(request.method, append_query(&url, &request.parameters))
        }
        .header("Authorization", format!("OAuth {}", token.token));

        let response = self.transport.execute(&http_request)?;
        if response.is_ok() {
            Ok(response)
        } else {
            let detail = Self::send_error_detail(&response);
            Err(response_error(
                format!("Failed to send API. [{detail}]"),
                &response,
            ))
        }
    }
}

impl ThreeLeggedProvider for MixiGraphProvider {
    /// Build the mixi authorization URI for the user's device.
    ///
    /// mixi redirects to the callback registered for the application, so
    /// `options.callback` is not sent. Permissions are joined with spaces.
    fn authorize_uri(
        &self,
        options: &AuthorizeOptions,
        _store: &mut dyn TokenStore,
    ) -> Result<String, OAuthError> {
        let mut params = vec![
            ("client_id".to_owned(), self.credentials.key().to_owned()),
            ("response_type".to_owned(), "code".to_owned()),
            ("scope".to_owned(), options.scope.join(" ")),
            ("state".to_owned(), self.provider_id().to_string()),
        ];

        let base = match self.device {
            ClientDevice::Smartphone => {
                params.push(("display".to_owned(), "touch".to_owned()));
                ENDPOINT_AUTH_URI
            }
            ClientDevice::Mobile(_) => {
                if self.device.is_docomo() {
                    params.push(("guid".to_owned(), "ON".to_owned()));
                }
                ENDPOINT_AUTH_URI_MOBILE
            }
            ClientDevice::Pc => {
                params.push(("display".to_owned(), "pc".to_owned()));
                ENDPOINT_AUTH_URI
            }
        };

        Ok(append_query(base, &params))
    }

    fn parse_access_token(
        &mut self,
        request: &InboundRequest,
        _store: &mut dyn TokenStore,
    ) -> Result<(), OAuthError> {
        self.access_token = None;

        let grant = vec![
            ("grant_type".to_owned(), "authorization_code".to_owned()),
            ("code".to_owned(), request.query("code").unwrap_or_default().to_owned()),
            ("redirect_uri".to_owned(), request.url().to_owned()),
        ];
        let fields = self.request_token(grant, "Failed to obtain an access token.")?;
        let token = AccessToken::from_oauth2_fields(fields)
            .ok_or_else(|| OAuthError::Parse("access_token missing".to_owned()))?;
        info!("Obtained mixi Graph access token");
        self.access_token = Some(token);
        Ok(())
    }

    fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    fn set_access_token(&mut self, token: Option<AccessToken>) {
        self.access_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use passage_http::{Carrier, MockTransport};

    use crate::store::MemoryTokenStore;

    fn provider(transport: &Arc<MockTransport>, device: ClientDevice) -> MixiGraphProvider {
        let credentials = ConsumerCredentials::new("client-id", "client-secret").unwrap();
        MixiGraphProvider::new(
            credentials,
            Arc::clone(transport) as Arc<dyn HttpTransport>,
            device,
        )
    }

    fn token_response(access: &str, refresh: &str) -> HttpResponse {
        HttpResponse::json_body(
            200,
            &serde_json::json!({
                "access_token": access,
                "refresh_token": refresh,
                "expires_in": 900,
                "scope": "r_profile",
            }),
        )
    }

    fn authorize_uri(device: ClientDevice) -> String {
        let transport = Arc::new(MockTransport::new());
        provider(&transport, device)
            .authorize_uri(
                &AuthorizeOptions::new().scope("r_profile").scope("r_voice"),
                &mut MemoryTokenStore::new(),
            )
            .unwrap()
    }

    #[test]
    fn test_authorize_uri_by_device() {
        let common = "client_id=client-id&response_type=code&scope=r_profile+r_voice&state=mixi3-legged";
        assert_eq!(
            authorize_uri(ClientDevice::Pc),
            format!("https://mixi.jp/connect_authorize.pl?{common}&display=pc")
        );
        assert_eq!(
            authorize_uri(ClientDevice::Smartphone),
            format!("https://mixi.jp/connect_authorize.pl?{common}&display=touch")
        );
        assert_eq!(
            authorize_uri(ClientDevice::Mobile(Carrier::DoCoMo)),
            format!("http://m.mixi.jp/connect_authorize.pl?{common}&guid=ON")
        );
        assert_eq!(
            authorize_uri(ClientDevice::Mobile(Carrier::Au)),
            format!("http://m.mixi.jp/connect_authorize.pl?{common}")
        );
    }

    #[test]
    fn test_parse_access_token() {
        let transport = Arc::new(MockTransport::new().with_response(token_response("A1", "R1")));
        let mut mixi = provider(&transport, ClientDevice::Pc);

        mixi.parse_access_token(
            &InboundRequest::get("https://app.example/cb?code=c1&state=mixi3-legged"),
            &mut MemoryTokenStore::new(),
        )
        .unwrap();

        let token = mixi.access_token().unwrap();
        assert_eq!(token.token, "A1");
        assert_eq!(token.refresh_token(), Some("R1"));
        assert_eq!(token.expires_in(), Some(900));

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, ENDPOINT_TOKEN_URI);
        match sent.body {
            Body::Form(fields) => {
                assert!(fields.contains(&("grant_type".to_owned(), "authorization_code".to_owned())));
                assert!(fields.contains(&("code".to_owned(), "c1".to_owned())));
                assert!(fields.contains(&(
                    "redirect_uri".to_owned(),
                    "https://app.example/cb".to_owned()
                )));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_parse_access_token_error() {
        let transport = Arc::new(MockTransport::new().with_response(HttpResponse::json_body(
            400,
            &serde_json::json!({"error": "invalid_grant"}),
        )));
        let mut mixi = provider(&transport, ClientDevice::Pc);

        let err = mixi
            .parse_access_token(
                &InboundRequest::get("https://app.example/cb?code=bad"),
                &mut MemoryTokenStore::new(),
            )
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to obtain an access token. [invalid_grant]"
        );
        assert!(!mixi.is_authorized());
    }

    #[test]
    fn test_reissue_access_token_replaces_token() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(token_response("A1", "R1"))
                .with_response(token_response("A2", "R2")),
        );
        let mut mixi = provider(&transport, ClientDevice::Pc);
        mixi.parse_access_token(
            &InboundRequest::get("https://app.example/cb?code=c1"),
            &mut MemoryTokenStore::new(),
        )
        .unwrap();

        let raw = mixi.reissue_access_token("R1").unwrap();

        assert_eq!(raw.get("access_token").map(String::as_str), Some("A2"));
        assert_eq!(mixi.access_token().unwrap().token, "A2");
    }

    #[test]
    fn test_reissue_access_token_failure_keeps_token() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(token_response("A1", "R1"))
                .with_response(HttpResponse::json_body(
                    401,
                    &serde_json::json!({"error": "invalid_grant"}),
                )),
        );
        let mut mixi = provider(&transport, ClientDevice::Pc);
        mixi.parse_access_token(
            &InboundRequest::get("https://app.example/cb?code=c1"),
            &mut MemoryTokenStore::new(),
        )
        .unwrap();

        let err = mixi.reissue_access_token("expired").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to re-issue of the access token. [invalid_grant]"
        );
        assert_eq!(mixi.access_token().unwrap().token, "A1");
    }

    #[test]
    fn test_send_uses_oauth_header_and_json_body() {
        let transport = Arc::new(MockTransport::new().with_response(HttpResponse::new(200, "{}")));
        let mut mixi = provider(&transport, ClientDevice::Pc);
        mixi.set_access_token(AccessToken::from_json(&serde_json::json!({"access_token": "A1"})));

        mixi.send(&ApiRequest::post("/2/voice/statuses").param("status", "hello"))
            .unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://api.mixi-platform.com/2/voice/statuses");
        assert_eq!(sent.header_value("Authorization"), Some("OAuth A1"));
        match sent.body {
            Body::Json(value) => assert_eq!(value, serde_json::json!({"status": "hello"})),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_send_error_detail() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(HttpResponse::json_body(
                    401,
                    &serde_json::json!({"error": "invalid_token", "error_description": "expired"}),
                ))
                .with_response(
                    HttpResponse::new(401, "").with_header(
                        "WWW-Authenticate",
                        "OAuth error='invalid_request'",
                    ),
                ),
        );
        let mut mixi = provider(&transport, ClientDevice::Pc);
        mixi.set_access_token(AccessToken::from_json(&serde_json::json!({"access_token": "A1"})));

        let err = mixi.send(&ApiRequest::get("/2/people/@me/@self")).unwrap_err();
        assert_eq!(err.to_string(), "Failed to send API. [invalid_token (expired)]");

        let err = mixi.send(&ApiRequest::get("/2/people/@me/@self")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to send API. [OAuth error='invalid_request']"
        );
    }
}
