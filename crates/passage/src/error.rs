//! CLI error types.

use passage_config::ConfigError;
use passage_oauth::{CertificateError, OAuthError, Rejection};
use passage_openid::OpenIdError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    OAuth(#[from] OAuthError),

    #[error("{0}")]
    OpenId(#[from] OpenIdError),

    #[error("{0}")]
    Certificate(#[from] CertificateError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("request is not authorized: {0}")]
    NotAuthorized(Rejection),

    #[error("{0}")]
    Validation(String),
}
