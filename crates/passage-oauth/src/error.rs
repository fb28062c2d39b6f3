//! Error types for OAuth providers.

use std::fmt;
use std::path::PathBuf;

use passage_http::TransportError;

/// Error from OAuth provider operations.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Missing or invalid credentials, or an unusable option.
    #[error("{0}")]
    Configuration(String),

    /// Provider identifier outside the supported set.
    #[error("The specified provider is not supported. [{0}]")]
    UnsupportedProvider(String),

    /// The platform rejected a request or answered with an error.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A platform response could not be interpreted.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The request could not be delivered.
    #[error("transport error")]
    Transport(#[from] TransportError),

    /// A signing certificate could not be loaded.
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),
}

impl OAuthError {
    /// Whether the error is caused by configuration rather than the platform.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedProvider(_) | Self::Certificate(_)
        )
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Platform request failure with the response attached when there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    /// Human readable message.
    pub message: String,
    /// HTTP status of the failed response.
    pub status: Option<u16>,
    /// Raw response body.
    pub body: Option<String>,
}

impl RequestError {
    /// Error without an HTTP response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Attach the response status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the raw response body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RequestError {}

/// Certificate loading/parsing error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CertificateError {
    /// PEM or DER structure is invalid.
    #[error("invalid certificate encoding")]
    Der(#[from] x509_cert::der::Error),

    /// Subject public key is not an RSA key.
    #[error("unsupported public key")]
    PublicKey(#[from] rsa::pkcs8::spki::Error),

    /// Certificate file could not be read.
    #[error("failed to read certificate {}", path.display())]
    Io {
        /// Certificate file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
