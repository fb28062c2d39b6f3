//! Configuration management for passage.
//!
//! Parses `passage.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `http.user_agent`
//! - `<provider>.consumer_key` and `<provider>.consumer_secret` for
//!   `twitter`, `facebook`, `mixi_graph` and `mixi`
//! - `mixi.debug_owner_id`
//! - `openid.realm`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override HTTP read timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Override outbound User-Agent header.
    pub user_agent: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "passage.toml";

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP configuration.
    pub http: HttpConfig,
    /// Twitter consumer credentials.
    pub twitter: Option<CredentialsConfig>,
    /// Facebook consumer credentials.
    pub facebook: Option<CredentialsConfig>,
    /// mixi Graph API (3-legged) consumer credentials.
    pub mixi_graph: Option<CredentialsConfig>,
    /// mixi mobile application (2-legged) configuration.
    pub mixi: Option<MixiAppConfig>,
    /// OpenID relying party configuration.
    pub openid: OpenIdConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Outbound HTTP configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Read timeout applied to every platform call.
    pub timeout_secs: u64,
    /// User-Agent header sent to platforms.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: "passage".to_owned(),
        }
    }
}

/// Consumer credentials for one OAuth provider.
///
/// Both fields are optional here: values passed explicitly when a provider is
/// constructed take precedence, and the provider rejects whatever is still
/// missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// OAuth consumer key (client ID).
    pub consumer_key: Option<String>,
    /// OAuth consumer secret (client secret).
    pub consumer_secret: Option<String>,
}

/// mixi mobile application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MixiAppConfig {
    /// OAuth consumer key.
    pub consumer_key: Option<String>,
    /// OAuth consumer secret.
    pub consumer_secret: Option<String>,
    /// Accept RSA signatures verified against expired certificates.
    pub allow_expired_certificates: bool,
    /// Owner ID used when a request carries no `opensocial_owner_id`.
    pub debug_owner_id: Option<String>,
    /// Replacement certificates for RSA-SHA1 verification.
    pub certificates: CertificatePaths,
}

impl MixiAppConfig {
    /// Credentials part of the mixi section.
    #[must_use]
    pub fn credentials(&self) -> CredentialsConfig {
        CredentialsConfig {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
        }
    }
}

/// PEM certificate files replacing the built-in ones, per signature variant.
///
/// Relative paths are resolved against the config file directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertificatePaths {
    /// PC application signatures.
    pub pc: Option<PathBuf>,
    /// Touch application signatures.
    pub touch: Option<PathBuf>,
    /// Photo upload callbacks.
    pub photo_upload: Option<PathBuf>,
    /// Lifecycle event callbacks.
    pub lifecycle_event: Option<PathBuf>,
}

/// OpenID relying party configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenIdConfig {
    /// Realm sent with authentication requests (defaults to the return URL).
    pub realm: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`twitter.consumer_key`").
        field: String,
        /// Error message (e.g., "${`TWITTER_KEY`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `passage.toml` in current directory and parents.
    /// Without any file, the defaults apply and every provider must receive
    /// its credentials explicitly.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(timeout) = settings.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(user_agent) = &settings.user_agent {
            self.http.user_agent.clone_from(user_agent);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Provider credentials are not checked here; providers reject missing
    /// credentials when they are constructed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        require_non_empty(&self.http.user_agent, "http.user_agent")?;

        if let Some(ref realm) = self.openid.realm {
            require_non_empty(realm, "openid.realm")?;
            require_http_url(realm, "openid.realm")?;
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.http.user_agent = expand::expand_env(&self.http.user_agent, "http.user_agent")?;

        for (section, credentials) in [
            ("twitter", self.twitter.as_mut()),
            ("facebook", self.facebook.as_mut()),
            ("mixi_graph", self.mixi_graph.as_mut()),
        ] {
            if let Some(credentials) = credentials {
                expand::expand_opt(
                    &mut credentials.consumer_key,
                    &format!("{section}.consumer_key"),
                )?;
                expand::expand_opt(
                    &mut credentials.consumer_secret,
                    &format!("{section}.consumer_secret"),
                )?;
            }
        }

        if let Some(ref mut mixi) = self.mixi {
            expand::expand_opt(&mut mixi.consumer_key, "mixi.consumer_key")?;
            expand::expand_opt(&mut mixi.consumer_secret, "mixi.consumer_secret")?;
            expand::expand_opt(&mut mixi.debug_owner_id, "mixi.debug_owner_id")?;
        }

        expand::expand_opt(&mut self.openid.realm, "openid.realm")?;

        Ok(())
    }

    /// Resolve relative certificate paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let Some(ref mut mixi) = self.mixi else {
            return;
        };
        let certificates = &mut mixi.certificates;
        for path in [
            &mut certificates.pc,
            &mut certificates.touch,
            &mut certificates.photo_upload,
            &mut certificates.lifecycle_event,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = config_dir.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.user_agent, "passage");
        assert!(config.twitter.is_none());
        assert!(config.mixi.is_none());
        assert!(config.openid.realm.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_parse_provider_credentials() {
        let toml = r#"
[twitter]
consumer_key = "tw-key"
consumer_secret = "tw-secret"

[facebook]
consumer_key = "fb-key"

[mixi_graph]
consumer_key = "mg-key"
consumer_secret = "mg-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let twitter = config.twitter.unwrap();
        assert_eq!(twitter.consumer_key.as_deref(), Some("tw-key"));
        assert_eq!(twitter.consumer_secret.as_deref(), Some("tw-secret"));
        let facebook = config.facebook.unwrap();
        assert_eq!(facebook.consumer_key.as_deref(), Some("fb-key"));
        assert!(facebook.consumer_secret.is_none());
        assert_eq!(
            config.mixi_graph.unwrap().consumer_secret.as_deref(),
            Some("mg-secret")
        );
    }

    #[test]
    fn test_parse_mixi_config() {
        let toml = r#"
[mixi]
consumer_key = "app-key"
consumer_secret = "app-secret"
allow_expired_certificates = true
debug_owner_id = "12345"

[mixi.certificates]
pc = "certs/pc.pem"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let mixi = config.mixi.unwrap();
        assert!(mixi.allow_expired_certificates);
        assert_eq!(mixi.debug_owner_id.as_deref(), Some("12345"));
        assert_eq!(mixi.certificates.pc, Some(PathBuf::from("certs/pc.pem")));
        assert!(mixi.certificates.touch.is_none());
        assert_eq!(mixi.credentials().consumer_key.as_deref(), Some("app-key"));
    }

    #[test]
    fn test_resolve_certificate_paths() {
        let toml = r#"
[mixi.certificates]
pc = "certs/pc.pem"
lifecycle_event = "/etc/passage/lifecycle.pem"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let certificates = &config.mixi.as_ref().unwrap().certificates;
        assert_eq!(
            certificates.pc,
            Some(PathBuf::from("/project/certs/pc.pem"))
        );
        assert_eq!(
            certificates.lifecycle_event,
            Some(PathBuf::from("/etc/passage/lifecycle.pem"))
        );
    }

    #[test]
    fn test_resolve_paths_without_mixi_section() {
        let mut config = Config::default();
        config.resolve_paths(Path::new("/project"));
        assert!(config.mixi.is_none());
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        let overrides = CliSettings {
            timeout_secs: Some(5),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.user_agent, "passage"); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.user_agent, "passage");
    }

    #[test]
    fn test_expand_env_vars_credentials() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("TEST_PASSAGE_TW_KEY", "key-from-env");
            std::env::remove_var("TEST_PASSAGE_TW_SECRET");
        }

        let toml = r#"
[twitter]
consumer_key = "${TEST_PASSAGE_TW_KEY}"
consumer_secret = "${TEST_PASSAGE_TW_SECRET:-fallback}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        let twitter = config.twitter.unwrap();
        assert_eq!(twitter.consumer_key.as_deref(), Some("key-from-env"));
        assert_eq!(twitter.consumer_secret.as_deref(), Some("fallback"));

        unsafe {
            std::env::remove_var("TEST_PASSAGE_TW_KEY");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MISSING_VAR_PASSAGE_TEST");
        }

        let toml = r#"
[mixi]
consumer_secret = "${MISSING_VAR_PASSAGE_TEST}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("MISSING_VAR_PASSAGE_TEST"));
        assert!(err.to_string().contains("mixi.consumer_secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[http]
timeout_secs = 10

[facebook]
consumer_key = "fb"
consumer_secret = "fb-secret"

[mixi.certificates]
touch = "touch.pem"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.mixi.unwrap().certificates.touch,
            Some(dir.path().join("touch.pem"))
        );
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/passage.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_zero() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert_validation_error(&config, &["timeout_secs", "greater than 0"]);
    }

    #[test]
    fn test_validate_user_agent_empty() {
        let mut config = Config::default();
        config.http.user_agent = String::new();
        assert_validation_error(&config, &["user_agent", "empty"]);
    }

    #[test]
    fn test_validate_openid_realm_scheme() {
        let mut config = Config::default();
        config.openid.realm = Some("example.com".to_owned());
        assert_validation_error(&config, &["openid.realm", "http"]);
    }

    #[test]
    fn test_validate_passes_with_empty_credentials() {
        let mut config = Config::default();
        config.twitter = Some(CredentialsConfig::default());
        // Credentials are checked by the provider constructors, not here
        assert!(config.validate().is_ok());
    }
}
