//! Credential and token types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use passage_config::CredentialsConfig;

use crate::error::OAuthError;

/// Consumer key and secret issued by a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    key: String,
    secret: String,
}

impl ConsumerCredentials {
    /// Create credentials; both values must be non-empty.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, OAuthError> {
        let key = key.into();
        let secret = secret.into();
        if key.trim().is_empty() {
            return Err(OAuthError::configuration("Consumer key is undefined."));
        }
        if secret.trim().is_empty() {
            return Err(OAuthError::configuration("Consumer secret is undefined."));
        }
        Ok(Self { key, secret })
    }

    /// Resolve credentials from explicit values falling back to configuration
    /// field by field.
    pub fn resolve(
        key: Option<&str>,
        secret: Option<&str>,
        config: Option<&CredentialsConfig>,
    ) -> Result<Self, OAuthError> {
        let key = key
            .map(str::to_owned)
            .or_else(|| config.and_then(|c| c.consumer_key.clone()))
            .unwrap_or_default();
        let secret = secret
            .map(str::to_owned)
            .or_else(|| config.and_then(|c| c.consumer_secret.clone()))
            .unwrap_or_default();
        Self::new(key, secret)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Temporary OAuth 1.0 request token awaiting user approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub token_secret: String,
}

/// Access token returned by a platform.
///
/// `raw` keeps every field of the token response; JSON numbers are stored as
/// their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// `oauth_token` (OAuth 1.0) or `access_token` (OAuth 2).
    pub token: String,
    /// `oauth_token_secret` for OAuth 1.0 tokens.
    pub token_secret: Option<String>,
    /// All fields of the token response.
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl AccessToken {
    /// Build an OAuth 1.0 token from `oauth_token` / `oauth_token_secret` pairs.
    pub fn from_oauth1_pairs(pairs: &[(String, String)]) -> Option<Self> {
        let raw: BTreeMap<String, String> = pairs.iter().cloned().collect();
        let token = raw.get("oauth_token").filter(|t| !t.is_empty())?.clone();
        let token_secret = raw.get("oauth_token_secret").cloned();
        Some(Self {
            token,
            token_secret,
            raw,
        })
    }

    /// Build an OAuth 2 token from response fields containing `access_token`.
    pub fn from_oauth2_fields(raw: BTreeMap<String, String>) -> Option<Self> {
        let token = raw.get("access_token").filter(|t| !t.is_empty())?.clone();
        Some(Self {
            token,
            token_secret: None,
            raw,
        })
    }

    /// Build an OAuth 2 token from a JSON object.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        Self::from_oauth2_fields(json_fields(value)?)
    }

    /// Field of the token response.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.get("refresh_token")
    }

    /// Lifetime in seconds, when the platform sent one.
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        self.get("expires_in").and_then(|v| v.parse().ok())
    }
}

/// Flatten a JSON object into string fields.
///
/// Strings are kept as is, numbers and booleans become their text form,
/// nested values are kept as JSON text and nulls are dropped.
pub(crate) fn json_fields(value: &serde_json::Value) -> Option<BTreeMap<String, String>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(k, v)| {
                let text = match v {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((k.clone(), text))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_credentials_require_key_and_secret() {
        let err = ConsumerCredentials::new("", "secret").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Consumer key is undefined.");

        let err = ConsumerCredentials::new("key", "  ").unwrap_err();
        assert_eq!(err.to_string(), "Consumer secret is undefined.");
    }

    #[test]
    fn test_credentials_explicit_values_override_config() {
        let config = CredentialsConfig {
            consumer_key: Some("config-key".to_owned()),
            consumer_secret: Some("config-secret".to_owned()),
        };

        let credentials =
            ConsumerCredentials::resolve(Some("explicit-key"), None, Some(&config)).unwrap();

        assert_eq!(credentials.key(), "explicit-key");
        assert_eq!(credentials.secret(), "config-secret");
    }

    #[test]
    fn test_credentials_missing_config_is_error() {
        assert!(ConsumerCredentials::resolve(None, None, None).is_err());
    }

    #[test]
    fn test_access_token_from_json_stringifies_numbers() {
        let token =
            AccessToken::from_json(&serde_json::json!({"access_token": "T", "expires_in": 3600}))
                .unwrap();

        assert_eq!(token.token, "T");
        assert_eq!(token.expires_in(), Some(3600));
        assert_eq!(
            token.raw,
            BTreeMap::from([
                ("access_token".to_owned(), "T".to_owned()),
                ("expires_in".to_owned(), "3600".to_owned()),
            ])
        );
    }

    #[test]
    fn test_access_token_from_oauth1_pairs() {
        let pairs = vec![
            ("oauth_token".to_owned(), "t".to_owned()),
            ("oauth_token_secret".to_owned(), "s".to_owned()),
            ("screen_name".to_owned(), "alice".to_owned()),
        ];
        let token = AccessToken::from_oauth1_pairs(&pairs).unwrap();
        assert_eq!(token.token_secret.as_deref(), Some("s"));
        assert_eq!(token.get("screen_name"), Some("alice"));
        assert!(AccessToken::from_oauth1_pairs(&[]).is_none());
    }

    #[test]
    fn test_access_token_serde() {
        let token = AccessToken::from_json(&serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
        }))
        .unwrap();
        let json = serde_json::to_string(&token).unwrap();
        let restored: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, token);
        assert_eq!(restored.refresh_token(), Some("r"));
    }
}
