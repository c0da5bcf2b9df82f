//! Configuration loading for the TradeFlow integrations service.
//!
//! Loads layered `.env` files and environment variables, producing a typed
//! [`AppConfig`]. Service settings use the `TRADEFLOW_` prefix; provider OAuth
//! credentials use the provider's own unprefixed names (`HUBSPOT_CLIENT_ID`, ...).

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SERVICE_PREFIX: &str = "TRADEFLOW_";
const REDACTED: &str = "[REDACTED]";
/// One day; longer windows would refresh every token on every call.
pub const MAX_TOKEN_REFRESH_LEEWAY_SECS: u64 = 86_400;

/// OAuth client credentials and endpoint overrides for one provider.
///
/// Missing values stay empty; a misconfigured provider only fails when it
/// talks to the token endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderCredentials {
    /// Whether both client id and secret are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    fn redact(&mut self) {
        if !self.client_secret.is_empty() {
            self.client_secret = REDACTED.to_string();
        }
    }
}

/// Trello uses an API key/secret pair on top of its OAuth-style credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrelloCredentials {
    #[serde(flatten)]
    pub oauth: ProviderCredentials,
    pub api_key: String,
    pub api_secret: String,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Upper bound for every outbound provider call.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Tokens expiring within this window are refreshed before a sync.
    #[serde(default = "default_token_refresh_leeway_secs")]
    pub token_refresh_leeway_secs: u64,
    #[serde(default)]
    pub hubspot: ProviderCredentials,
    #[serde(default)]
    pub bigin: ProviderCredentials,
    #[serde(default)]
    pub trello: TrelloCredentials,
    #[serde(default)]
    pub microsoft: ProviderCredentials,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            http_timeout_secs: default_http_timeout_secs(),
            token_refresh_leeway_secs: default_token_refresh_leeway_secs(),
            hubspot: ProviderCredentials::default(),
            bigin: ProviderCredentials::default(),
            trello: TrelloCredentials::default(),
            microsoft: ProviderCredentials::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Clamped to [`MAX_TOKEN_REFRESH_LEEWAY_SECS`] for configs built by hand.
    pub fn token_refresh_leeway(&self) -> chrono::Duration {
        let secs = self
            .token_refresh_leeway_secs
            .min(MAX_TOKEN_REFRESH_LEEWAY_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        config.hubspot.redact();
        config.bigin.redact();
        config.microsoft.redact();
        config.trello.oauth.redact();
        if !config.trello.api_secret.is_empty() {
            config.trello.api_secret = REDACTED.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates service settings. Provider credentials are not required.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout_secs == 0 || self.http_timeout_secs > 300 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_secs,
            });
        }

        if self.token_refresh_leeway_secs > MAX_TOKEN_REFRESH_LEEWAY_SECS {
            return Err(ConfigError::InvalidRefreshLeeway {
                value: self.token_refresh_leeway_secs,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if let Err(source) = self.bind_addr() {
            return Err(ConfigError::InvalidBindAddr {
                value: self.api_bind_addr.clone(),
                source,
            });
        }

        Ok(())
    }

    /// Names of providers whose client credentials are missing.
    pub fn unconfigured_providers(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.hubspot.is_configured() {
            missing.push("hubspot");
        }
        if !self.bigin.is_configured() {
            missing.push("bigin");
        }
        if !self.trello.oauth.is_configured() || self.trello.api_key.is_empty() {
            missing.push("trello");
        }
        if !self.microsoft.is_configured() {
            missing.push("microsoft");
        }
        missing
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_token_refresh_leeway_secs() -> u64 {
    60
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("http timeout must be between 1 and 300 seconds, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("token refresh leeway must be at most {max} seconds, got {value}", max = MAX_TOKEN_REFRESH_LEEWAY_SECS)]
    InvalidRefreshLeeway { value: u64 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("{key} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// Loads configuration using layered `.env` files and environment variables.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut layered = self.collect_layered_env()?;

        // Process environment wins over every file layer.
        for (key, value) in env::vars() {
            layered.insert(key, value);
        }

        self.build(layered)
    }

    fn build(&self, mut layered: BTreeMap<String, String>) -> Result<AppConfig, ConfigError> {
        let mut service = |name: &str| {
            layered
                .remove(&format!("{SERVICE_PREFIX}{name}"))
                .filter(|v| !v.is_empty())
        };

        let profile = service("PROFILE").unwrap_or_else(default_profile);
        let api_bind_addr = service("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = service("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = service("LOG_FORMAT").unwrap_or_else(default_log_format);
        let http_timeout_secs = service("HTTP_TIMEOUT_SECS")
            .map(|v| parse_secs("HTTP_TIMEOUT_SECS", v))
            .transpose()?
            .unwrap_or_else(default_http_timeout_secs);
        let token_refresh_leeway_secs = service("TOKEN_REFRESH_LEEWAY_SECS")
            .map(|v| parse_secs("TOKEN_REFRESH_LEEWAY_SECS", v))
            .transpose()?
            .unwrap_or_else(default_token_refresh_leeway_secs);

        let hubspot = provider_credentials(&mut layered, "HUBSPOT");
        let bigin = provider_credentials(&mut layered, "BIGIN");
        let microsoft = provider_credentials(&mut layered, "MICROSOFT");
        let trello = TrelloCredentials {
            oauth: provider_credentials(&mut layered, "TRELLO"),
            api_key: take_trimmed(&mut layered, "TRELLO_API_KEY").unwrap_or_default(),
            api_secret: take_trimmed(&mut layered, "TRELLO_API_SECRET").unwrap_or_default(),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            http_timeout_secs,
            token_refresh_leeway_secs,
            hubspot,
            bigin,
            trello,
            microsoft,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{SERVICE_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get(&format!("{SERVICE_PREFIX}PROFILE")).cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(self.base_dir.join(format!(".env.{profile}")), &mut values)?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{profile}.local")),
            &mut values,
        )?;

        Ok(values)
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    values.insert(key, value);
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_secs(name: &str, value: String) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key: format!("{SERVICE_PREFIX}{name}"),
        value,
    })
}

fn take_trimmed(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered.remove(key).and_then(|val| {
        let trimmed = val.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn provider_credentials(layered: &mut BTreeMap<String, String>, provider: &str) -> ProviderCredentials {
    ProviderCredentials {
        client_id: take_trimmed(layered, &format!("{provider}_CLIENT_ID")).unwrap_or_default(),
        client_secret: take_trimmed(layered, &format!("{provider}_CLIENT_SECRET"))
            .unwrap_or_default(),
        redirect_uri: take_trimmed(layered, &format!("{provider}_REDIRECT_URI"))
            .unwrap_or_default(),
        authorization_url: take_trimmed(layered, &format!("{provider}_AUTHORIZATION_URL")),
        token_url: take_trimmed(layered, &format!("{provider}_TOKEN_URL")),
        api_base: take_trimmed(layered, &format!("{provider}_API_BASE")),
    }
}
