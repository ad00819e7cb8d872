use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// Credentials and endpoints for the tool catalog.
///
/// Integrations whose credential is absent are left out of the catalog.
#[derive(Clone)]
pub struct IntegrationsConfig {
    pub news_api_key: Option<SecretString>,
    pub weather_api_key: Option<SecretString>,
    pub pinterest_api_key: Option<SecretString>,
    pub calendly_api_key: Option<SecretString>,
    pub pixabay_api_key: Option<SecretString>,
    pub tmdb_api_key: Option<SecretString>,
    pub crypto_api_key: Option<SecretString>,
    pub joke_api_key: Option<SecretString>,
    pub dictionary_api_key: Option<SecretString>,
    pub quote_api_key: Option<SecretString>,
    /// Base URL of the recommendation engine control API.
    pub rec_engine_url: Option<String>,
    pub rec_api_key: Option<SecretString>,
    /// Base URL of the integration relay (payments, mail, calendar, maps, web app).
    pub relay_url: Option<String>,
    pub relay_api_key: Option<SecretString>,
    pub http_timeout_secs: u64,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            news_api_key: None,
            weather_api_key: None,
            pinterest_api_key: None,
            calendly_api_key: None,
            pixabay_api_key: None,
            tmdb_api_key: None,
            crypto_api_key: None,
            joke_api_key: None,
            dictionary_api_key: None,
            quote_api_key: None,
            rec_engine_url: None,
            rec_api_key: None,
            relay_url: None,
            relay_api_key: None,
            http_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for IntegrationsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("IntegrationsConfig");
        for (name, key) in self.credentials() {
            s.field(name, &key.is_some());
        }
        s.field("rec_engine_url", &self.rec_engine_url)
            .field("relay_url", &self.relay_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

fn secret_env(key: &str) -> Result<Option<SecretString>, ConfigError> {
    Ok(optional_env(key)?.map(SecretString::from))
}

fn url_env(key: &str) -> Result<Option<String>, ConfigError> {
    let Some(raw) = optional_env(key)? else {
        return Ok(None);
    };
    let parsed = reqwest::Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("not a valid URL: {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(Some(raw.trim().trim_end_matches('/').to_string()))
}

impl IntegrationsConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            news_api_key: secret_env("NEWS_TOOL_API_KEY")?,
            weather_api_key: secret_env("WEATHER_TOOL_API_KEY")?,
            pinterest_api_key: secret_env("PINTEREST_TOOL_API_KEY")?,
            calendly_api_key: secret_env("CALENDLY_TOOL_API_KEY")?,
            pixabay_api_key: secret_env("PIXABAY_TOOL_API_KEY")?,
            tmdb_api_key: secret_env("TMDB_TOOL_API_KEY")?,
            crypto_api_key: secret_env("CRYPTO_TOOL_API_KEY")?,
            joke_api_key: secret_env("JOKE_TOOL_API_KEY")?,
            dictionary_api_key: secret_env("DICTIONARY_TOOL_API_KEY")?,
            quote_api_key: secret_env("QUOTE_TOOL_API_KEY")?,
            rec_engine_url: url_env("REC_ENGINE_URL")?,
            rec_api_key: secret_env("REC_API_KEY")?,
            relay_url: url_env("RELAY_URL")?,
            relay_api_key: secret_env("RELAY_API_KEY")?,
            http_timeout_secs: parse_optional_env("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        })
    }

    /// Every credential slot, by field name.
    pub fn credentials(&self) -> [(&'static str, Option<&SecretString>); 12] {
        [
            ("news_api_key", self.news_api_key.as_ref()),
            ("weather_api_key", self.weather_api_key.as_ref()),
            ("pinterest_api_key", self.pinterest_api_key.as_ref()),
            ("calendly_api_key", self.calendly_api_key.as_ref()),
            ("pixabay_api_key", self.pixabay_api_key.as_ref()),
            ("tmdb_api_key", self.tmdb_api_key.as_ref()),
            ("crypto_api_key", self.crypto_api_key.as_ref()),
            ("joke_api_key", self.joke_api_key.as_ref()),
            ("dictionary_api_key", self.dictionary_api_key.as_ref()),
            ("quote_api_key", self.quote_api_key.as_ref()),
            ("rec_api_key", self.rec_api_key.as_ref()),
            ("relay_api_key", self.relay_api_key.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::test_env::{ENV_LOCK, remove, set};

    #[test]
    fn test_debug_hides_secrets() {
        let config = IntegrationsConfig {
            news_api_key: Some(SecretString::from("news-secret-value".to_string())),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("news-secret-value"));
        assert!(debug.contains("news_api_key: true"));
        assert!(debug.contains("weather_api_key: false"));
    }

    #[test]
    fn test_resolve_reads_keys_and_trims_urls() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set("WEATHER_TOOL_API_KEY", "owm");
        set("REC_ENGINE_URL", "http://rec.internal:8080/");
        set("HTTP_TIMEOUT_SECS", "3");
        let config = IntegrationsConfig::resolve().unwrap();
        assert!(config.weather_api_key.is_some());
        assert_eq!(config.rec_engine_url.as_deref(), Some("http://rec.internal:8080"));
        assert_eq!(config.http_timeout_secs, 3);
        remove("WEATHER_TOOL_API_KEY");
        remove("REC_ENGINE_URL");
        remove("HTTP_TIMEOUT_SECS");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set("RELAY_URL", "ftp://relay");
        let err = IntegrationsConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RELAY_URL"));
        remove("RELAY_URL");
    }
}
