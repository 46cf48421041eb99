use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, result};

use lazy_static::lazy_static;
use strum::IntoEnumIterator;

pub type Res<T> = Result<T, String>;

pub trait ErrToStr<T, E: Display> {
    fn err_to_str(self) -> Res<T>;
}

impl<T, E: Display> ErrToStr<T, E> for result::Result<T, E> {
    fn err_to_str(self) -> Res<T> {
        self.map_err(|err| err.to_string())
    }
}

#[derive(strum_macros::Display, strum_macros::EnumIter, Eq, PartialEq, Debug, Hash, Clone, Copy)]
pub enum ConfigKey {
    #[strum(serialize = "DECKBOX_BACKEND_URL")]
    BackendUrl,
    #[strum(serialize = "DECKBOX_CARD_API_URL")]
    CardApiUrl,
    #[strum(serialize = "DECKBOX_SIGN_IN_URL")]
    SignInUrl,
    #[strum(serialize = "DECKBOX_REQUEST_TIMEOUT_SECS")]
    RequestTimeoutSecs,
    #[strum(serialize = "DECKBOX_STORAGE_PATH")]
    StoragePath,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

lazy_static! {
    pub static ref CONFIG_DEFAULTS: HashMap<ConfigKey, &'static str> = HashMap::from([
        (ConfigKey::BackendUrl, "http://localhost:3000"),
        (ConfigKey::CardApiUrl, "https://api.scryfall.com"),
        (ConfigKey::RequestTimeoutSecs, "15"),
    ]);
}

/// Reads `key` from the environment, falling back to its default. Blank values count as unset.
pub fn read_opt(key: ConfigKey) -> Option<String> {
    env::var(key.to_string())
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| CONFIG_DEFAULTS.get(&key).map(|value| value.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend_url: String,
    pub card_api_url: String,
    pub sign_in_url: String,
    pub request_timeout: Duration,
    pub storage_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        for key in ConfigKey::iter().filter(|key| env::var(key.to_string()).is_err()) {
            tracing::debug!("{} not set, using default", key);
        }
        Self::from_lookup(read_opt)
    }

    fn from_lookup(lookup: impl Fn(ConfigKey) -> Option<String>) -> Self {
        let backend_url = lookup(ConfigKey::BackendUrl)
            .unwrap_or_else(|| CONFIG_DEFAULTS[&ConfigKey::BackendUrl].to_string());
        let card_api_url = lookup(ConfigKey::CardApiUrl)
            .unwrap_or_else(|| CONFIG_DEFAULTS[&ConfigKey::CardApiUrl].to_string());
        let sign_in_url = lookup(ConfigKey::SignInUrl).unwrap_or_else(|| backend_url.clone());

        let request_timeout = lookup(ConfigKey::RequestTimeoutSecs)
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    tracing::warn!(
                        "ignoring invalid {}={:?}",
                        ConfigKey::RequestTimeoutSecs,
                        raw
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Config {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            card_api_url: card_api_url.trim_end_matches('/').to_string(),
            sign_in_url,
            request_timeout: Duration::from_secs(request_timeout),
            storage_path: lookup(ConfigKey::StoragePath).map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|key| CONFIG_DEFAULTS.get(&key).map(|value| value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:3000");
        assert_eq!(config.card_api_url, "https://api.scryfall.com");
        assert_eq!(config.sign_in_url, "http://localhost:3000");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.storage_path, None);
    }

    #[test]
    fn test_overrides_and_bad_timeout() {
        let config = Config::from_lookup(|key| match key {
            ConfigKey::BackendUrl => Some("http://deckbox.test/".to_string()),
            ConfigKey::RequestTimeoutSecs => Some("soon".to_string()),
            ConfigKey::StoragePath => Some("/tmp/deckbox.json".to_string()),
            _ => None,
        });
        assert_eq!(config.backend_url, "http://deckbox.test");
        assert_eq!(config.sign_in_url, "http://deckbox.test/");
        assert_eq!(config.card_api_url, "https://api.scryfall.com");
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/deckbox.json")));
    }

    #[test]
    fn test_config_key_names() {
        assert_eq!(ConfigKey::BackendUrl.to_string(), "DECKBOX_BACKEND_URL");
        assert_eq!(ConfigKey::StoragePath.to_string(), "DECKBOX_STORAGE_PATH");
        assert_eq!(ConfigKey::iter().count(), 5);
    }
}
