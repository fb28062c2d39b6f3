//! Twitter (OAuth 1.0a, HMAC-SHA1).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use passage_http::{
    Body, HttpRequest, HttpResponse, HttpTransport, InboundRequest, Method, Multipart,
    append_query,
};

use super::{
    ApiRequest, AuthorizeOptions, OAuthProvider, ProviderId, ThreeLeggedProvider, platform_error,
    response_error, token_not_set,
};
use crate::error::{OAuthError, RequestError};
use crate::oauth1::{self, Signer};
use crate::store::TokenStore;
use crate::token::{AccessToken, ConsumerCredentials, RequestToken};

const ENDPOINT_BASE_URI: &str = "https://api.twitter.com";

const REQUEST_TOKEN_KEY: &str = "twitter.request_token";
const REQUEST_TOKEN_SECRET_KEY: &str = "twitter.request_token_secret";

const INVALID_CONSUMER: &str = "Consumer key (or secret) is invalid.";
const ACCESS_TOKEN_FAILED: &str = "Couldn't get access token.";

/// Twitter provider.
pub struct TwitterProvider {
    credentials: ConsumerCredentials,
    transport: Arc<dyn HttpTransport>,
    access_token: Option<AccessToken>,
}

impl fmt::Debug for TwitterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterProvider")
            .field("consumer_key", &self.credentials.key())
            .field("authorized", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl TwitterProvider {
    pub fn new(credentials: ConsumerCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            transport,
            access_token: None,
        }
    }

    /// Sign and execute a request, returning whatever the platform answered.
    fn execute_signed(
        &self,
        signer: &Signer<'_>,
        method: Method,
        url: &str,
        params: &[(String, String)],
        body: Body,
    ) -> Result<HttpResponse, OAuthError> {
        let oauth = signer
            .sign(method, url, params)
            .map_err(|e| OAuthError::configuration(format!("Failed to sign request: {e}")))?;
        let request = HttpRequest::new(method, url)
            .header("Authorization", oauth1::authorization_header(&oauth))
            .body(body);
        debug!(url, "Sending signed Twitter request");
        Ok(self.transport.execute(&request)?)
    }

    fn request_token(&self, callback: &str) -> Result<RequestToken, OAuthError> {
        let url = self.endpoint_uri("/oauth/request_token");
        let params = vec![("oauth_callback".to_owned(), callback.to_owned())];
        let response = self.execute_signed(
            &Signer::new(&self.credentials),
            Method::Post,
            &url,
            &params,
            Body::Empty,
        )?;

        if !response.is_ok() {
            debug!(status = response.status, "Request token was refused");
            return Err(OAuthError::configuration(INVALID_CONSUMER));
        }
        let fields = response.form_params();
        let field = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };
        match (field("oauth_token"), field("oauth_token_secret")) {
            (Some(token), Some(token_secret)) => Ok(RequestToken {
                token,
                token_secret,
            }),
            _ => Err(OAuthError::configuration(INVALID_CONSUMER)),
        }
    }
}

impl OAuthProvider for TwitterProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Twitter
    }

    fn endpoint_base_uri(&self) -> &str {
        ENDPOINT_BASE_URI
    }

    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError> {
        let token = self.access_token.as_ref().ok_or_else(token_not_set)?;
        let token_secret = token.token_secret.as_deref().ok_or_else(|| {
            OAuthError::Request(RequestError::new("Access token secret is not set."))
        })?;
        let signer = Signer::new(&self.credentials).with_token(&token.token, token_secret);
        let url = self.endpoint_uri(&request.uri);

        let response = if !request.method.has_body() {
            let url = append_query(&url, &request.parameters);
            self.execute_signed(&signer, request.method, &url, &[], Body::Empty)?
        } else if request.files.is_empty() {
            self.execute_signed(
                &signer,
                request.method,
                &url,
                &request.parameters,
                Body::Form(request.parameters.clone()),
            )?
        } else {
            // Multipart fields are not part of the signature base string.
            let body = Body::Multipart(Multipart {
                fields: request.parameters.clone(),
                files: request.files.clone(),
            });
            self.execute_signed(&signer, request.method, &url, &[], body)?
        };

        if response.is_ok() {
            Ok(response)
        } else {
            let message = platform_error(&response)
                .unwrap_or_else(|| format!("Twitter returned an error code. [{}]", response.status));
            Err(response_error(message, &response))
        }
    }
}

impl ThreeLeggedProvider for TwitterProvider {
    /// Obtain a request token and return the Twitter authorization URI.
    ///
    /// The callback gets `state=twitter` appended so the callback request can
    /// be routed back here. Without a callback the out-of-band flow is used.
    fn authorize_uri(
        &self,
        options: &AuthorizeOptions,
        store: &mut dyn TokenStore,
    ) -> Result<String, OAuthError> {
        let callback = options.callback.as_deref().map_or_else(
            || "oob".to_owned(),
            |callback| {
                append_query(
                    callback,
                    &[("state".to_owned(), self.provider_id().to_string())],
                )
            },
        );

        let request_token = self.request_token(&callback)?;
        info!("Obtained Twitter request token");

        store.set(REQUEST_TOKEN_KEY, request_token.token.clone());
        store.set(REQUEST_TOKEN_SECRET_KEY, request_token.token_secret);

        Ok(format!(
            "{}?oauth_token={}",
            self.endpoint_uri("/oauth/authorize"),
            oauth1::encode(&request_token.token)
        ))
    }

    fn parse_access_token(
        &mut self,
        request: &InboundRequest,
        store: &mut dyn TokenStore,
    ) -> Result<(), OAuthError> {
        self.access_token = None;
        let token = store.remove(REQUEST_TOKEN_KEY);
        let token_secret = store.remove(REQUEST_TOKEN_SECRET_KEY);
        let (Some(token), Some(token_secret)) = (token, token_secret) else {
            return Err(OAuthError::Request(RequestError::new(ACCESS_TOKEN_FAILED)));
        };

        let params: Vec<(String, String)> = request
            .query("oauth_verifier")
            .map(|verifier| vec![("oauth_verifier".to_owned(), verifier.to_owned())])
            .unwrap_or_default();
        let signer = Signer::new(&self.credentials).with_token(&token, &token_secret);
        let url = self.endpoint_uri("/oauth/access_token");
        let response = self.execute_signed(&signer, Method::Post, &url, &params, Body::Empty)?;

        if !response.is_ok() {
            return Err(response_error(ACCESS_TOKEN_FAILED, &response));
        }
        let access_token = AccessToken::from_oauth1_pairs(&response.form_params())
            .ok_or_else(|| response_error(ACCESS_TOKEN_FAILED, &response))?;

        info!("Obtained Twitter access token");
        self.access_token = Some(access_token);
        Ok(())
    }

    fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    fn set_access_token(&mut self, token: Option<AccessToken>) {
        self.access_token = token;
    }
}
