//! Transport trait, request/response types and error type.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::multipart::Multipart;

/// HTTP request method used by platform APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-case method name as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether parameters travel in the request body rather than the query.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method name that is not GET, POST, PUT or DELETE.
#[derive(Debug, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(s.to_owned())),
        }
    }
}

/// Error from the HTTP transport layer.
///
/// Platform error statuses are not transport errors: the transport returns
/// every response and callers decide what a status means.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed")]
    Http(#[from] ureq::Error),

    /// I/O error (reading an upload file).
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Request cannot be expressed (e.g. a body on a GET request).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No endpoint answered the request.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// `application/json` document.
    Json(serde_json::Value),
    /// `multipart/form-data` with file parts.
    Multipart(Multipart),
    /// Pre-encoded bytes.
    Raw {
        /// Content-Type header value.
        content_type: String,
        /// Body bytes.
        bytes: Vec<u8>,
    },
}

impl Body {
    /// Encode the body into its Content-Type and bytes.
    ///
    /// Returns `None` for [`Body::Empty`].
    pub fn encode(&self) -> Result<Option<(String, Vec<u8>)>, TransportError> {
        let encoded = match self {
            Self::Empty => return Ok(None),
            Self::Form(fields) => {
                let body = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish();
                (
                    "application/x-www-form-urlencoded".to_owned(),
                    body.into_bytes(),
                )
            }
            Self::Json(value) => ("application/json".to_owned(), serde_json::to_vec(value)?),
            Self::Multipart(multipart) => multipart.encode()?,
            Self::Raw {
                content_type,
                bytes,
            } => (content_type.clone(), bytes.clone()),
        };
        Ok(Some(encoded))
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Body,
}

impl HttpRequest {
    /// Create a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Look up a request header (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Append form-encoded parameters to a URL's query string.
#[must_use]
pub fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_owned();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// HTTP response returned by a transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers in received order.
    pub headers: Vec<(String, String)>,
    /// Decoded response body.
    pub body: String,
}

impl HttpResponse {
    /// Create a response with a status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response.
    #[must_use]
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("Content-Type", "application/json")
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Content-Type header, or an empty string.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header("Content-Type").unwrap_or_default()
    }

    /// Whether the Content-Type declares JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type()
            .to_ascii_lowercase()
            .contains("application/json")
    }

    /// Whether the platform answered 200.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Decode a form-encoded body (`a=1&b=2`).
    #[must_use]
    pub fn form_params(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.body.trim().as_bytes())
            .into_owned()
            .collect()
    }
}

/// Outbound HTTP capability.
///
/// Implementations perform the request and return the platform's response
/// whatever its status; only failures to obtain a response are errors.
pub trait HttpTransport: Send + Sync {
    /// Perform a request.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Whether gzip-compressed responses are decoded by this transport.
    fn supports_gzip(&self) -> bool {
        false
    }
}
