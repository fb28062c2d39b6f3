//! Error types for OpenID sessions.

use passage_http::TransportError;

/// Error from OpenID operations.
#[derive(Debug, thiserror::Error)]
pub enum OpenIdError {
    /// Provider name outside the supported set.
    #[error("The specified provider is not supported. [{0}]")]
    UnsupportedProvider(String),

    /// No OpenID endpoint could be discovered for an identifier.
    #[error("OpenID discovery failed for {identifier}: {reason}")]
    Discovery {
        /// Identifier being discovered.
        identifier: String,
        /// What was missing.
        reason: String,
    },

    /// XRDS document could not be parsed.
    #[error("XRDS parse error")]
    Xml(#[from] quick_xml::Error),

    /// XRDS document is not valid in its declared encoding.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// The request could not be delivered.
    #[error("transport error")]
    Transport(#[from] TransportError),
}

impl OpenIdError {
    pub(crate) fn discovery(identifier: &str, reason: impl Into<String>) -> Self {
        Self::Discovery {
            identifier: identifier.to_owned(),
            reason: reason.into(),
        }
    }
}
