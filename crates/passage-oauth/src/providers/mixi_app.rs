//! mixi application requests (OAuth 1.0, 2-legged).
//!
//! mixi signs the requests it forwards to an application, with HMAC-SHA1 for
//! mobile apps and RSA-SHA1 for everything else. The application calls back
//! into the OpenSocial REST API signed with its consumer credentials only,
//! acting on behalf of the requesting owner.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use tracing::{debug, warn};

use passage_http::{
    Body, HttpRequest, HttpResponse, HttpTransport, InboundRequest, Method, append_query,
};

use super::{ApiRequest, OAuthProvider, ProviderId, json_parameters, response_error};
use crate::certs::{CertificateSet, PinnedCertificate};
use crate::error::{OAuthError, RequestError};
use crate::oauth1::{self, Signer};
use crate::token::ConsumerCredentials;
use crate::verify::{Authorization, Rejection, SignatureContext, SignatureType, SignatureVerifier};

const ENDPOINT_BASE_URI: &str = "http://api.mixi-platform.com/os/0.8";

/// `name="value"` attributes of an HMAC `Authorization` header.
static HMAC_HEADER_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-z_]+)="([^"]+)""#).unwrap());

static OAUTH_PROBLEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"oauth_problem="([^"]+)""#).unwrap());

/// Header attributes copied into the HMAC signed parameter set.
const HMAC_HEADER_KEYS: [&str; 4] = [
    "oauth_nonce",
    "oauth_signature_method",
    "oauth_timestamp",
    "oauth_version",
];

/// mixi application provider.
pub struct MixiAppProvider {
    credentials: ConsumerCredentials,
    transport: Arc<dyn HttpTransport>,
    certificates: CertificateSet,
    allow_expired_certificates: bool,
    requestor_id: Option<String>,
}

impl fmt::Debug for MixiAppProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixiAppProvider")
            .field("consumer_key", &self.credentials.key())
            .field("requestor_id", &self.requestor_id)
            .field("allow_expired_certificates", &self.allow_expired_certificates)
            .finish_non_exhaustive()
    }
}

impl MixiAppProvider {
    pub fn new(
        credentials: ConsumerCredentials,
        transport: Arc<dyn HttpTransport>,
        certificates: CertificateSet,
    ) -> Self {
        Self {
            credentials,
            transport,
            certificates,
            allow_expired_certificates: false,
            requestor_id: None,
        }
    }

    /// Accept RSA signatures checked against an expired certificate.
    #[must_use]
    pub fn allow_expired_certificates(mut self, allow: bool) -> Self {
        self.allow_expired_certificates = allow;
        self
    }

    /// Owner on whose behalf API calls are made.
    #[must_use]
    pub fn with_requestor_id(mut self, requestor_id: Option<String>) -> Self {
        self.requestor_id = requestor_id.filter(|id| !id.is_empty());
        self
    }

    #[must_use]
    pub fn requestor_id(&self) -> Option<&str> {
        self.requestor_id.as_deref()
    }

    /// Local part of an OpenSocial ID (`mixi.jp:1234` becomes `1234`).
    #[must_use]
    pub fn guid(id: &str) -> &str {
        id.split_once(':').map_or(id, |(_, local)| local)
    }

    /// Verify the signature mixi put on an inbound request.
    pub fn is_authorized(
        &self,
        signature_type: SignatureType,
        request: &InboundRequest,
    ) -> Result<Authorization, OAuthError> {
        self.is_authorized_at(signature_type, request, SystemTime::now())
    }

    /// [`is_authorized`](Self::is_authorized) with certificate expiry judged
    /// at `now`.
    pub fn is_authorized_at(
        &self,
        signature_type: SignatureType,
        request: &InboundRequest,
        now: SystemTime,
    ) -> Result<Authorization, OAuthError> {
        let authorization = match signature_type {
            SignatureType::Hmac => self.verify_hmac(request),
            SignatureType::RsaPc => {
                self.verify_rsa(PinnedCertificate::Pc, request, request.merged_parameters(), now)
            }
            SignatureType::RsaTouch => self.verify_rsa(
                PinnedCertificate::Touch,
                request,
                request.merged_parameters(),
                now,
            ),
            SignatureType::RsaPhotoUpload => {
                let mut params = request.query_pairs().to_vec();
                params.extend(request.form_pairs().iter().cloned());
                if let Some(header) = request
                    .header("Authorization")
                    .filter(|h| h.starts_with("OAuth "))
                {
                    params.extend(oauth1::split_header(header, true));
                }
                self.verify_rsa(PinnedCertificate::PhotoUpload, request, params, now)
            }
            SignatureType::RsaLifecycleEvent => self.verify_lifecycle_event(request, now),
        };

        if let Authorization::NotAuthorized(rejection) = authorization {
            debug!(%signature_type, %rejection, url = request.url(), "Signed request rejected");
        }
        Ok(authorization)
    }

    fn verify_hmac(&self, request: &InboundRequest) -> Authorization {
        let Some(header) = request.header("Authorization") else {
            return Authorization::NotAuthorized(Rejection::MissingSignature);
        };

        let mut attributes: Vec<(String, String)> = Vec::new();
        for caps in HMAC_HEADER_PARAM.captures_iter(header) {
            let value = oauth1::decode(&caps[2]);
            match attributes.iter_mut().find(|(k, _)| k == &caps[1]) {
                Some(existing) => existing.1 = value,
                None => attributes.push((caps[1].to_owned(), value)),
            }
        }
        let attribute = |name: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        let Some(signature) = attribute("oauth_signature") else {
            return Authorization::NotAuthorized(Rejection::MissingSignature);
        };

        let mut params: Vec<(String, String)> = Vec::new();
        for key in HMAC_HEADER_KEYS {
            let Some(value) = attribute(key) else {
                return Authorization::NotAuthorized(Rejection::Malformed);
            };
            params.push((key.to_owned(), value));
        }
        if let Some(app_id) = request.query("opensocial_app_id") {
            params.push(("opensocial_app_id".to_owned(), app_id.to_owned()));
        }
        if let Some(owner_id) = request
            .query("opensocial_owner_id")
            .or(self.requestor_id.as_deref())
        {
            params.push(("opensocial_owner_id".to_owned(), owner_id.to_owned()));
        }
        for (key, value) in request.query_pairs() {
            if !params.iter().any(|(k, _)| k == key) {
                params.push((key.clone(), value.clone()));
            }
        }
        if !params.iter().any(|(k, _)| k == "oauth_consumer_key") {
            params.push((
                "oauth_consumer_key".to_owned(),
                self.credentials.key().to_owned(),
            ));
        }

        if BASE64_STANDARD.decode(signature.trim()).is_err() {
            return Authorization::NotAuthorized(Rejection::Malformed);
        }
        let context = SignatureContext::new(request.method().as_str(), request.url(), params);
        let verifier = SignatureVerifier::HmacSha1 {
            consumer_secret: self.credentials.secret().to_owned(),
            token_secret: String::new(),
        };
        verdict(verifier.verify(&context, &signature))
    }

    fn verify_lifecycle_event(&self, request: &InboundRequest, now: SystemTime) -> Authorization {
        if request.parameter("opensocial_owner_id").is_some()
            || request.parameter("opensocial_viewer_id").is_some()
        {
            return Authorization::NotAuthorized(Rejection::OpenSocialIdPresent);
        }
        let Some(header) = request
            .header("Authorization")
            .filter(|h| h.starts_with("OAuth "))
        else {
            return Authorization::NotAuthorized(Rejection::MissingSignature);
        };

        let mut params = request.query_pairs().to_vec();
        params.extend(oauth1::split_header(header, false));
        self.verify_rsa(PinnedCertificate::LifecycleEvent, request, params, now)
    }

    fn verify_rsa(
        &self,
        which: PinnedCertificate,
        request: &InboundRequest,
        params: Vec<(String, String)>,
        now: SystemTime,
    ) -> Authorization {
        let Some(signature) = params
            .iter()
            .find(|(k, _)| k == "oauth_signature")
            .map(|(_, v)| v.clone())
        else {
            return Authorization::NotAuthorized(Rejection::MissingSignature);
        };

        let certificate = self.certificates.get(which);
        if certificate.is_expired_at(now) {
            if !self.allow_expired_certificates {
                return Authorization::NotAuthorized(Rejection::CertificateExpired);
            }
            warn!(
                certificate = which.name(),
                not_after = certificate.not_after_unix(),
                "Verifying with an expired certificate"
            );
        }

        if BASE64_STANDARD.decode(signature.trim()).is_err() {
            return Authorization::NotAuthorized(Rejection::Malformed);
        }
        let context = SignatureContext::new(request.method().as_str(), request.url(), params);
        let verifier = SignatureVerifier::RsaSha1(certificate.public_key().clone());
        verdict(verifier.verify(&context, &signature))
    }
}

fn verdict(matched: bool) -> Authorization {
    if matched {
        Authorization::Authorized
    } else {
        Authorization::NotAuthorized(Rejection::Mismatch)
    }
}

impl OAuthProvider for MixiAppProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::MixiApp
    }

    fn endpoint_base_uri(&self) -> &str {
        ENDPOINT_BASE_URI
    }

    fn send(&self, request: &ApiRequest) -> Result<HttpResponse, OAuthError> {
        let requestor_id = self
            .requestor_id
            .as_deref()
            .ok_or_else(|| RequestError::new("Requestor ID is not set."))?;

        let mut query = Vec::new();
        if !request.method.has_body() {
            query.extend(request.parameters.iter().cloned());
        }
        query.push(("xoauth_requestor_id".to_owned(), requestor_id.to_owned()));
        let url = append_query(&self.endpoint_uri(&request.uri), &query);

        let oauth = Signer::new(&self.credentials)
            .sign(request.method, &url, &[])
            .map_err(|e| OAuthError::configuration(format!("Failed to sign request: {e}")))?;
        let mut http_request = HttpRequest::new(request.method, url)
            .header("Authorization", oauth1::authorization_header(&oauth));
        if request.method.has_body() {
            http_request = http_request.body(Body::Json(json_parameters(&request.parameters)));
        }
        if self.transport.supports_gzip() {
            http_request = http_request.header("Accept-Encoding", "gzip");
        }

        debug!(url = %http_request.url, "Sending mixi application request");
        let response = self.transport.execute(&http_request)?;
        if response.is_ok() {
            return Ok(response);
        }

        let message = match response
            .header("WWW-Authenticate")
            .and_then(|header| OAUTH_PROBLEM.captures(header))
        {
            Some(caps) => format!("OAuth authenticate error. [{}]", &caps[1]),
            None => format!("mixi returned an error code. [{}]", response.status),
        };
        Err(response_error(message, &response))
    }
}
