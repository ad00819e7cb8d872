use std::str::FromStr;

use crate::error::ConfigError;

/// Read an env var, treating unset and empty as `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "not valid UTF-8".to_string(),
        }),
    }
}

/// Parse an env var into `T`, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

/// Parse a boolean env var (`true`/`false`, `1`/`0`, `yes`/`no`).
pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key)? {
        None => Ok(default),
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("must be 'true' or 'false', got '{other}'"),
            }),
        },
    }
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::Mutex;

    /// Serializes tests that mutate process environment.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn set(key: &str, value: &str) {
        // SAFETY: callers hold ENV_LOCK, so no other test thread touches the environment.
        unsafe { std::env::set_var(key, value) }
    }

    pub(crate) fn remove(key: &str) {
        // SAFETY: see `set`.
        unsafe { std::env::remove_var(key) }
    }
}

#[cfg(test)]
mod tests {
    use super::test_env::{ENV_LOCK, remove, set};
    use super::*;

    #[test]
    fn test_optional_env_treats_empty_as_unset() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set("TOOLGATE_TEST_EMPTY", "  ");
        assert_eq!(optional_env("TOOLGATE_TEST_EMPTY").unwrap(), None);
        remove("TOOLGATE_TEST_EMPTY");
        assert_eq!(optional_env("TOOLGATE_TEST_EMPTY").unwrap(), None);
    }

    #[test]
    fn test_parse_optional_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        remove("TOOLGATE_TEST_NUM");
        assert_eq!(parse_optional_env("TOOLGATE_TEST_NUM", 7u64).unwrap(), 7);
        set("TOOLGATE_TEST_NUM", "42");
        assert_eq!(parse_optional_env("TOOLGATE_TEST_NUM", 7u64).unwrap(), 42);
        set("TOOLGATE_TEST_NUM", "forty");
        let err = parse_optional_env("TOOLGATE_TEST_NUM", 7u64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TOOLGATE_TEST_NUM"));
        remove("TOOLGATE_TEST_NUM");
    }

    #[test]
    fn test_parse_bool_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set("TOOLGATE_TEST_BOOL", "yes");
        assert!(parse_bool_env("TOOLGATE_TEST_BOOL", false).unwrap());
        set("TOOLGATE_TEST_BOOL", "0");
        assert!(!parse_bool_env("TOOLGATE_TEST_BOOL", true).unwrap());
        set("TOOLGATE_TEST_BOOL", "maybe");
        assert!(parse_bool_env("TOOLGATE_TEST_BOOL", true).is_err());
        remove("TOOLGATE_TEST_BOOL");
    }
}
