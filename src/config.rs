use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::UploadSettings;
use crate::error::UploadError;
use crate::server::{ClientConfig, DEFAULT_SERVER_URL, DEFAULT_SESSION_SERVER_URL};
use crate::upload::{DEFAULT_CHUNK_SIZE, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "crema-upload.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server_url: Option<String>,
    /// Host for `get_sd` and `save_json`; follows `server_url` when only that is set.
    #[serde(default)]
    pub session_server_url: Option<String>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub verify_tls: Option<bool>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_seconds: Option<u64>,
    #[serde(default)]
    pub fail_on_incomplete: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub client: ClientConfig,
    pub settings: UploadSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; the default file is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, UploadError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| UploadError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| UploadError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, UploadError> {
        let defaults = ClientConfig::default();
        let session_url = config
            .session_server_url
            .or_else(|| config.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SESSION_SERVER_URL.to_string());
        let base_url = config
            .server_url
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if base_url.trim().is_empty() || session_url.trim().is_empty() {
            return Err(UploadError::InvalidConfig(
                "server_url and session_server_url must not be empty".to_string(),
            ));
        }

        let chunk_size = config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(UploadError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        let default_retry = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: config.max_attempts.unwrap_or(default_retry.max_attempts),
            backoff_seconds: config
                .backoff_seconds
                .unwrap_or(default_retry.backoff_seconds),
        };
        if retry.max_attempts == 0 {
            return Err(UploadError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            client: ClientConfig {
                base_url: base_url.trim().to_string(),
                session_url: session_url.trim().to_string(),
                connect_timeout: config
                    .connect_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.connect_timeout),
                timeout: config
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                verify_tls: config.verify_tls.unwrap_or(defaults.verify_tls),
            },
            settings: UploadSettings {
                retry,
                chunk_size,
                fail_on_incomplete: config.fail_on_incomplete.unwrap_or(false),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.client, ClientConfig::default());
        assert_eq!(resolved.settings, UploadSettings::default());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = Config {
            chunk_size: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, UploadError::InvalidConfig(_));
    }
}
