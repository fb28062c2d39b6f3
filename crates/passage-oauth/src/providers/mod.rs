//! OAuth provider capability and the supported platforms.

mod facebook;
mod mixi_app;
mod mixi_graph;
mod twitter;

pub use facebook::FacebookProvider;
pub use mixi_app::MixiAppProvider;
pub use mixi_graph::MixiGraphProvider;
pub use twitter::TwitterProvider;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use passage_http::{FilePart, HttpResponse, InboundRequest, Method};

use crate::error::{OAuthError, RequestError};
use crate::store::TokenStore;
use crate::token::AccessToken;

/// Supported OAuth platform identifiers.
///
/// The identifier doubles as the OAuth `state` value that routes a callback
/// back to its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Twitter,
    Facebook,
    /// mixi app requests signed by mixi (2-legged).
    MixiApp,
    /// mixi Graph API (3-legged).
    MixiGraph,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [Self::Twitter, Self::Facebook, Self::MixiApp, Self::MixiGraph];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::MixiApp => "mixi2-legged",
            Self::MixiGraph => "mixi3-legged",
        }
    }

    /// Whether the provider has an authorization callback step.
    #[must_use]
    pub fn is_three_legged(self) -> bool {
        self != Self::MixiApp
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| OAuthError::UnsupportedProvider(s.to_owned()))
    }
}

/// Platform API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Path relative to the provider's endpoint base, or an absolute URI.
    pub uri: String,
    pub method: Method,
    /// Query (GET/DELETE) or body (POST/PUT) parameters.
    pub parameters: Vec<(String, String)>,
    /// Files to upload as multipart parts.
    pub files: Vec<FilePart>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method,
            parameters: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::Post, uri)
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.push(FilePart {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

/// Options for building an authorization URI.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeOptions {
    /// Absolute URI the platform redirects back to.
    pub callback: Option<String>,
    /// Requested permissions.
    pub scope: Vec<String>,
}

impl AuthorizeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope.push(scope.into());
        self
    }
}

/// Capability shared by every OAuth provider.
pub trait OAuthProvider {
    fn provider_id(&self) -> ProviderId;

    fn endpoint_base_uri(&self) -> &str;

    /// Resolve a path against the endpoint base. Absolute URIs pass through.
    fn endpoint_uri(&self, path: &str) -> String {
        join_endpoint(self.endpoint_base_uri(), path)
    }

    /// Send a signed API request.
    ///
    /// Returns the response when the platform answers 200.
    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError>;
}

/// Providers with a user authorization step (3-legged OAuth).
pub trait ThreeLeggedProvider: OAuthProvider {
    /// Build the URI the user is sent to for approval.
    fn authorize_uri(
        &self,
        options: &AuthorizeOptions,
        store: &mut dyn TokenStore,
    ) -> Result<String, OAuthError>;

    /// Exchange the callback parameters for an access token.
    ///
    /// Any previous token is discarded first, so a failure leaves the provider
    /// unauthorized.
    fn parse_access_token(
        &mut self,
        request: &InboundRequest,
        store: &mut dyn TokenStore,
    ) -> Result<(), OAuthError>;

    fn access_token(&self) -> Option<&AccessToken>;

    fn set_access_token(&mut self, token: Option<AccessToken>);

    fn is_authorized(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist the current token (or clear it) under `<provider>.access_token`.
    fn save_access_token(&self, store: &mut dyn TokenStore) -> Result<(), OAuthError> {
        let key = access_token_key(self.provider_id());
        match self.access_token() {
            Some(token) => {
                let json =
                    serde_json::to_string(token).map_err(|e| OAuthError::Parse(e.to_string()))?;
                store.set(&key, json);
            }
            None => {
                store.remove(&key);
            }
        }
        Ok(())
    }

    /// Load a token saved by [`save_access_token`](Self::save_access_token).
    ///
    /// Returns whether a token was found.
    fn restore_access_token(&mut self, store: &dyn TokenStore) -> Result<bool, OAuthError> {
        let Some(json) = store.get(&access_token_key(self.provider_id())) else {
            return Ok(false);
        };
        let token: AccessToken =
            serde_json::from_str(&json).map_err(|e| OAuthError::Parse(e.to_string()))?;
        self.set_access_token(Some(token));
        Ok(true)
    }
}

/// A provider instance, one variant per supported platform.
#[derive(Debug)]
pub enum Provider {
    Twitter(TwitterProvider),
    Facebook(FacebookProvider),
    MixiGraph(MixiGraphProvider),
    MixiApp(MixiAppProvider),
}

impl Provider {
    /// 3-legged view, `None` for the mixi app provider.
    #[must_use]
    pub fn three_legged(&self) -> Option<&dyn ThreeLeggedProvider> {
        match self {
            Self::Twitter(p) => Some(p),
            Self::Facebook(p) => Some(p),
            Self::MixiGraph(p) => Some(p),
            Self::MixiApp(_) => None,
        }
    }

    pub fn three_legged_mut(&mut self) -> Option<&mut dyn ThreeLeggedProvider> {
        match self {
            Self::Twitter(p) => Some(p),
            Self::Facebook(p) => Some(p),
            Self::MixiGraph(p) => Some(p),
            Self::MixiApp(_) => None,
        }
    }

    #[must_use]
    pub fn mixi_app(&self) -> Option<&MixiAppProvider> {
        match self {
            Self::MixiApp(p) => Some(p),
            _ => None,
        }
    }
}

impl OAuthProvider for Provider {
    fn provider_id(&self) -> ProviderId {
        match self {
            Self::Twitter(p) => p.provider_id(),
            Self::Facebook(p) => p.provider_id(),
            Self::MixiGraph(p) => p.provider_id(),
            Self::MixiApp(p) => p.provider_id(),
        }
    }

    fn endpoint_base_uri(&self) -> &str {
        match self {
            Self::Twitter(p) => p.endpoint_base_uri(),
            Self::Facebook(p) => p.endpoint_base_uri(),
            Self::MixiGraph(p) => p.endpoint_base_uri(),
            Self::MixiApp(p) => p.endpoint_base_uri(),
        }
    }

    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError> {
        match self {
            Self::Twitter(p) => p.send(request),
            Self::Facebook(p) => p.send(request),
            Self::MixiGraph(p) => p.send(request),
            Self::MixiApp(p) => p.send(request),
        }
    }
}

pub(crate) fn access_token_key(provider: ProviderId) -> String {
    format!("{provider}.access_token")
}

pub(crate) fn join_endpoint(base: &str, path: &str) -> String {
    if url::Url::parse(path).is_ok() {
        return path.to_owned();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Error text reported by a platform in a JSON error body.
///
/// Understands `{"error": {"message": ...}}`, `{"error": "...",
/// "error_description": "..."}` and `{"errors": [{"message": ...}]}`.
pub(crate) fn platform_error(response: &HttpResponse) -> Option<String> {
    let value: serde_json::Value = response.json().ok()?;
    match value.get("error") {
        Some(serde_json::Value::Object(error)) => {
            return error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned);
        }
        Some(serde_json::Value::String(error)) => {
            return Some(
                match value
                    .get("error_description")
                    .and_then(serde_json::Value::as_str)
                {
                    Some(description) => format!("{error} ({description})"),
                    None => error.clone(),
                },
            );
        }
        _ => {}
    }
    value
        .get("errors")?
        .get(0)?
        .get("message")?
        .as_str()
        .map(str::to_owned)
}

/// Request error carrying the response status and body.
pub(crate) fn response_error(message: impl Into<String>, response: &HttpResponse) -> OAuthError {
    OAuthError::Request(
        RequestError::new(message)
            .with_status(response.status)
            .with_body(response.body.clone()),
    )
}

pub(crate) fn token_not_set() -> OAuthError {
    OAuthError::Request(RequestError::new("Access token is not set."))
}

/// Parameters as a JSON object of strings.
pub(crate) fn json_parameters(parameters: &[(String, String)]) -> serde_json::Value {
    serde_json::Value::Object(
        parameters
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}
