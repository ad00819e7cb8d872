//! Configuration resolved once at startup and passed explicitly.
//!
//! Nothing outside this module reads the process environment.

mod gate;
mod helpers;
mod integrations;
mod policy_file;

use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

pub use self::gate::GateConfig;
pub use self::integrations::IntegrationsConfig;
pub use self::policy_file::{PolicyEntry, PolicyFile};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub gate: GateConfig,
    pub integrations: IntegrationsConfig,
}

impl Config {
    /// Resolve from environment variables. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gate: GateConfig::resolve()?,
            integrations: IntegrationsConfig::resolve()?,
        })
    }

    /// Load the configured policy file, if any.
    pub fn policy_file(&self) -> Result<Option<PolicyFile>, ConfigError> {
        self.gate
            .policy_file
            .as_deref()
            .map(PolicyFile::load)
            .transpose()
    }

    /// Stable digest of everything that shapes the tool registry.
    ///
    /// Credentials contribute only their own SHA-256, so rotating a key
    /// changes the fingerprint without the key appearing in it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let i = &self.integrations;
        for (name, key) in i.credentials() {
            hasher.update(name.as_bytes());
            match key {
                Some(key) => {
                    hasher.update([1u8]);
                    hasher.update(Sha256::digest(key.expose_secret().as_bytes()));
                }
                None => hasher.update([0u8]),
            }
        }
        for url in [&i.rec_engine_url, &i.relay_url] {
            hasher.update(url.as_deref().unwrap_or_default().as_bytes());
            hasher.update([0xffu8]);
        }
        hasher.update(i.http_timeout_secs.to_le_bytes());
        hasher.update(self.gate.confirmation_timeout_secs.to_le_bytes());
        for path in [&self.gate.policy_file, &self.gate.audit_jsonl] {
            if let Some(path) = path {
                hasher.update(path.to_string_lossy().as_bytes());
            }
            hasher.update([0xffu8]);
        }
        hasher.update([u8::from(self.gate.audit_tracing)]);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let base = Config::default();
        assert_eq!(base.fingerprint(), Config::default().fingerprint());
        assert_eq!(base.fingerprint().len(), 64);

        let mut with_key = Config::default();
        with_key.integrations.weather_api_key = Some(SecretString::from("k1".to_string()));
        assert_ne!(base.fingerprint(), with_key.fingerprint());

        let mut rotated = with_key.clone();
        rotated.integrations.weather_api_key = Some(SecretString::from("k2".to_string()));
        assert_ne!(with_key.fingerprint(), rotated.fingerprint());
        assert!(!with_key.fingerprint().contains("k1"));

        let mut relay = Config::default();
        relay.integrations.relay_url = Some("https://relay.test".to_string());
        assert_ne!(base.fingerprint(), relay.fingerprint());
    }

    #[test]
    fn test_policy_file_absent() {
        assert!(Config::default().policy_file().unwrap().is_none());
    }
}
