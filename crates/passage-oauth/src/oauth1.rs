//! OAuth 1.0 signing primitives (RFC 5849).
//!
//! Used both to sign outbound requests (Twitter, mixi 2-legged API) and to
//! rebuild the signature base string of inbound mixi requests.

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use rand::RngExt;
use regex::Regex;
use sha1::Sha1;

use passage_http::Method;

use crate::token::ConsumerCredentials;

/// OAuth unreserved characters: A-Z a-z 0-9 - . _ ~
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `key="value"` or `key=value` pairs of an `Authorization: OAuth` header.
static HEADER_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z0-9_-]+)=(?:"([^"]*)"|([^,]*))"#).unwrap());

pub(crate) type HmacSha1 = Hmac<Sha1>;

/// Percent-encode string per RFC 3986.
#[must_use]
pub fn encode(input: &str) -> String {
    percent_encode(input.as_bytes(), OAUTH_ENCODE_SET).to_string()
}

/// Decode a percent-encoded string. Invalid UTF-8 is replaced.
#[must_use]
pub fn decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Generate cryptographically random nonce (32 hex characters).
#[must_use]
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Generate Unix timestamp.
#[must_use]
pub fn generate_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

/// Base URL and query parameters of a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// `scheme://host[:port]/path` with lower-case scheme and host and the
    /// default port dropped.
    pub base: String,
    /// Decoded query parameters.
    pub query: Vec<(String, String)>,
}

/// Normalize a request URL per RFC 5849 Section 3.4.1.2.
pub fn normalize_url(url: &str) -> Result<NormalizedUrl, url::ParseError> {
    let parsed = url::Url::parse(url)?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let base = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}{}", parsed.scheme(), parsed.path()),
        None => format!("{}://{host}{}", parsed.scheme(), parsed.path()),
    };
    let query = parsed.query_pairs().into_owned().collect();
    Ok(NormalizedUrl { base, query })
}

/// Normalize parameters: encode keys and values, sort by key then value.
///
/// `oauth_signature` is never part of the signed set.
#[must_use]
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| k != "oauth_signature")
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build OAuth signature base string per RFC 5849 Section 3.4.1.
///
/// Format: `HTTP_METHOD&encoded_base_url&encoded_parameters`
#[must_use]
pub fn signature_base_string(method: &str, base_url: &str, params: &[(String, String)]) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url),
        encode(&normalize_parameters(params))
    )
}

fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", encode(consumer_secret), encode(token_secret))
}

/// Error signing an outbound request.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("invalid endpoint URI: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid HMAC key length")]
    Key,
}

fn keyed_mac(consumer_secret: &str, token_secret: &str) -> Result<HmacSha1, SignError> {
    HmacSha1::new_from_slice(signing_key(consumer_secret, token_secret).as_bytes())
        .map_err(|_| SignError::Key)
}

/// Sign a base string with HMAC-SHA1 and return the base64 signature.
pub fn hmac_sha1(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, SignError> {
    let mut mac = keyed_mac(consumer_secret, token_secret)?;
    mac.update(base_string.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a decoded HMAC-SHA1 signature.
pub(crate) fn hmac_sha1_matches(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
    signature: &[u8],
) -> bool {
    let Ok(mut mac) = keyed_mac(consumer_secret, token_secret) else {
        return false;
    };
    mac.update(base_string.as_bytes());
    mac.verify_slice(signature).is_ok()
}

/// Build an `Authorization` header value from OAuth parameters.
#[must_use]
pub fn authorization_header(oauth_params: &[(String, String)]) -> String {
    let parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect();
    format!("OAuth {}", parts.join(", "))
}

/// Split an `Authorization: OAuth ...` header into decoded parameters.
///
/// `realm` is always dropped. With `oauth_only` only `oauth_*` parameters are
/// returned.
#[must_use]
pub fn split_header(header: &str, oauth_only: bool) -> Vec<(String, String)> {
    let body = header
        .trim_start()
        .strip_prefix("OAuth ")
        .unwrap_or(header);
    HEADER_PARAM
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            if name == "realm" || (oauth_only && !name.starts_with("oauth_")) {
                return None;
            }
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            Some((name.to_owned(), decode(value.trim())))
        })
        .collect()
}

/// HMAC-SHA1 request signer.
pub struct Signer<'a> {
    consumer: &'a ConsumerCredentials,
    token: Option<(&'a str, &'a str)>,
}

impl<'a> Signer<'a> {
    /// Signer for consumer-only (2-legged) requests.
    #[must_use]
    pub fn new(consumer: &'a ConsumerCredentials) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    /// Sign with a request or access token as well.
    #[must_use]
    pub fn with_token(mut self, token: &'a str, token_secret: &'a str) -> Self {
        self.token = Some((token, token_secret));
        self
    }

    /// Sign a request and return the OAuth protocol parameters, including
    /// `oauth_signature`, ready for [`authorization_header`].
    ///
    /// `params` holds the query or form parameters that travel with the
    /// request; any `oauth_*` entries (e.g. `oauth_callback`) are carried into
    /// the returned set. Query parameters embedded in `url` are signed too.
    pub fn sign(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Vec<(String, String)>, SignError> {
        self.sign_with(method, url, params, &generate_nonce(), &generate_timestamp())
    }

    pub(crate) fn sign_with(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<Vec<(String, String)>, SignError> {
        let normalized = normalize_url(url)?;

        let mut oauth_params = vec![
            ("oauth_consumer_key".to_owned(), self.consumer.key().to_owned()),
            ("oauth_nonce".to_owned(), nonce.to_owned()),
            ("oauth_signature_method".to_owned(), "HMAC-SHA1".to_owned()),
            ("oauth_timestamp".to_owned(), timestamp.to_owned()),
            ("oauth_version".to_owned(), "1.0".to_owned()),
        ];
        if let Some((token, _)) = self.token {
            oauth_params.push(("oauth_token".to_owned(), token.to_owned()));
        }
        oauth_params.extend(
            params
                .iter()
                .filter(|(k, _)| k.starts_with("oauth_"))
                .cloned(),
        );

        let mut signed: Vec<(String, String)> = normalized.query;
        signed.extend(params.iter().filter(|(k, _)| !k.starts_with("oauth_")).cloned());
        signed.extend(oauth_params.iter().cloned());

        let base = signature_base_string(method.as_str(), &normalized.base, &signed);
        let token_secret = self.token.map_or("", |(_, secret)| secret);
        let signature = hmac_sha1(&base, self.consumer.secret(), token_secret)?;

        oauth_params.push(("oauth_signature".to_owned(), signature));
        oauth_params.sort();
        Ok(oauth_params)
    }
}
