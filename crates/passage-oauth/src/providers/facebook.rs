//! Facebook Graph API (OAuth 2).

use std::fmt;
use std::sync::Arc;

use tracing::info;

use passage_http::{
    Body, HttpRequest, HttpResponse, HttpTransport, InboundRequest, Method, Multipart,
    append_query,
};

use super::{
    ApiRequest, AuthorizeOptions, OAuthProvider, ProviderId, ThreeLeggedProvider, platform_error,
    response_error, token_not_set,
};
use crate::error::{OAuthError, RequestError};
use crate::store::TokenStore;
use crate::token::{AccessToken, ConsumerCredentials, json_fields};

const ENDPOINT_BASE_URI: &str = "https://graph.facebook.com";

const ACCESS_TOKEN_FAILED: &str = "Couldn't get access token.";

/// Facebook provider.
pub struct FacebookProvider {
    credentials: ConsumerCredentials,
    transport: Arc<dyn HttpTransport>,
    access_token: Option<AccessToken>,
}

impl fmt::Debug for FacebookProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookProvider")
            .field("client_id", &self.credentials.key())
            .field("authorized", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl FacebookProvider {
    pub fn new(credentials: ConsumerCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            transport,
            access_token: None,
        }
    }

    /// Profile of the authorized user (`/me`).
    pub fn profile(&self) -> Result<serde_json::Value, OAuthError> {
        let token = self.access_token.as_ref().ok_or_else(token_not_set)?;
        let url = append_query(
            &self.endpoint_uri("/me"),
            &[("access_token".to_owned(), token.token.clone())],
        );
        let response = self
            .transport
            .execute(&HttpRequest::new(Method::Get, url))?;
        if !response.is_ok() {
            let message = platform_error(&response)
                .unwrap_or_else(|| format!("Facebook returned an error code. [{}]", response.status));
            return Err(response_error(message, &response));
        }
        response.json().map_err(|e| OAuthError::Parse(e.to_string()))
    }
}

/// Token response fields from a JSON or form-encoded body.
fn token_fields(response: &HttpResponse) -> std::collections::BTreeMap<String, String> {
    match response.json::<serde_json::Value>() {
        Ok(value) => json_fields(&value).unwrap_or_default(),
        Err(_) => response.form_params().into_iter().collect(),
    }
}

impl OAuthProvider for FacebookProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Facebook
    }

    fn endpoint_base_uri(&self) -> &str {
        ENDPOINT_BASE_URI
    }

    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError> {
        let token = self.access_token.as_ref().ok_or_else(token_not_set)?;
        let mut parameters = vec![("access_token".to_owned(), token.token.clone())];
        parameters.extend(request.parameters.iter().cloned());

        let url = self.endpoint_uri(&request.uri);
        let http_request = if !request.method.has_body() {
            HttpRequest::new(request.method, append_query(&url, &parameters))
        } else if request.files.is_empty() {
            HttpRequest::new(request.method, url).body(Body::Form(parameters))
        } else {
            HttpRequest::new(request.method, url).body(Body::Multipart(Multipart {
                fields: parameters,
                files: request.files.clone(),
            }))
        };

        let response = self.transport.execute(&http_request)?;
        if response.is_ok() {
            Ok(response)
        } else {
            let message = platform_error(&response)
                .unwrap_or_else(|| format!("Facebook returned an error code. [{}]", response.status));
            Err(response_error(message, &response))
        }
    }
}

impl ThreeLeggedProvider for FacebookProvider {
    /// Build the Facebook dialog URI. A callback is required; permissions are
    /// joined with commas.
    fn authorize_uri(
        &self,
        options: &AuthorizeOptions,
        _store: &mut dyn TokenStore,
    ) -> Result<String, OAuthError> {
        let callback = options
            .callback
            .as_deref()
            .ok_or_else(|| OAuthError::configuration("Callback URI is required for facebook."))?;

        let mut params = vec![
            ("client_id".to_owned(), self.credentials.key().to_owned()),
            ("redirect_uri".to_owned(), callback.to_owned()),
        ];
        if !options.scope.is_empty() {
            params.push(("scope".to_owned(), options.scope.join(",")));
        }
        params.push(("state".to_owned(), self.provider_id().to_string()));

        Ok(append_query(&self.endpoint_uri("/oauth/authorize"), &params))
    }

    fn parse_access_token(
        &mut self,
        request: &InboundRequest,
        _store: &mut dyn TokenStore,
    ) -> Result<(), OAuthError> {
        self.access_token = None;

        let Some(code) = request.query("code").filter(|c| !c.is_empty()) else {
            let message = request
                .query("error_description")
                .or_else(|| request.query("error"))
                .unwrap_or("Authorization code is missing.");
            return Err(OAuthError::Request(RequestError::new(message)));
        };

        let params = vec![
            ("client_id".to_owned(), self.credentials.key().to_owned()),
            ("redirect_uri".to_owned(), request.url().to_owned()),
            ("client_secret".to_owned(), self.credentials.secret().to_owned()),
            ("code".to_owned(), code.to_owned()),
        ];
        let http_request = HttpRequest::new(Method::Post, self.endpoint_uri("/oauth/access_token"))
            .body(Body::Form(params));
        let response = self.transport.execute(&http_request)?;

        if !response.is_ok() {
            let message = platform_error(&response).unwrap_or_else(|| ACCESS_TOKEN_FAILED.to_owned());
            return Err(response_error(message, &response));
        }
        let access_token = AccessToken::from_oauth2_fields(token_fields(&response))
            .ok_or_else(|| response_error(ACCESS_TOKEN_FAILED, &response))?;

        info!("Obtained Facebook access token");
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
