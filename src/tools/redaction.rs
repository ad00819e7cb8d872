//! Scrubbing of invocation parameters before they reach the audit trail.
//!
//! Audit records outlive the session and may be forwarded to external sinks,
//! so credentials never land in them and oversized strings are clipped.

use serde_json::{Map, Value};

use crate::gate::classifier::identifier_words;

const REDACTED: &str = "[REDACTED]";
const MAX_STRING_CHARS: usize = 512;
const SENSITIVE_EXACT: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "api_key",
    "apikey",
    "appid",
    "access_token",
    "refresh_token",
    "session_token",
    "id_token",
    "token",
    "password",
    "passwd",
    "secret",
    "client_secret",
    "private_key",
    "card_number",
    "cvc",
];
const SENSITIVE_SUBSTRINGS: &[&str] = &[
    "token",
    "secret",
    "password",
    "credential",
    "authorization",
];
/// Matched as a whole identifier word only; `author` and `oauth_provider`
/// are ordinary fields.
const SENSITIVE_WORDS: &[&str] = &["auth", "apikey", "passphrase"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    if SENSITIVE_EXACT.contains(&lower.as_str()) {
        return true;
    }
    if SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return true;
    }
    identifier_words(key)
        .iter()
        .any(|w| SENSITIVE_WORDS.contains(&w.as_str()))
}

fn scrub_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => scrub_object(map),
        Value::Array(items) => {
            for item in items {
                scrub_in_place(item);
            }
        }
        Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
            let clipped: String = s.chars().take(MAX_STRING_CHARS).collect();
            *s = format!("{clipped}...[truncated]");
        }
        _ => {}
    }
}

fn scrub_object(map: &mut Map<String, Value>) {
    for (key, val) in map {
        if is_sensitive_key(key) {
            *val = Value::String(REDACTED.to_string());
        } else {
            scrub_in_place(val);
        }
    }
}

/// Copy of `value` with sensitive keys redacted and long strings clipped.
pub fn redact_sensitive_json(value: &Value) -> Value {
    let mut cloned = value.clone();
    scrub_in_place(&mut cloned);
    cloned
}

#[cfg(test)]
mod tests {
    use super::redact_sensitive_json;

    #[test]
    fn redacts_exact_sensitive_keys() {
        let input = serde_json::json!({
            "headers": {
                "Authorization": "Bearer abc",
                "x-api-key": "k-123",
                "content-type": "application/json"
            },
            "appid": "openweather-key",
            "city": "Paris"
        });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["headers"]["Authorization"], "[REDACTED]");
        assert_eq!(out["headers"]["x-api-key"], "[REDACTED]");
        assert_eq!(out["headers"]["content-type"], "application/json");
        assert_eq!(out["appid"], "[REDACTED]");
        assert_eq!(out["city"], "Paris");
    }

    #[test]
    fn redacts_nested_substring_keys() {
        let input = serde_json::json!({
            "params": {
                "clientSecret": "xyz",
                "charges": [{"card_number": "4242"}, {"amount": 10}]
            }
        });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["params"]["clientSecret"], "[REDACTED]");
        assert_eq!(out["params"]["charges"][0]["card_number"], "[REDACTED]");
        assert_eq!(out["params"]["charges"][1]["amount"], 10);
    }

    #[test]
    fn auth_matches_whole_words_only() {
        let input = serde_json::json!({
            "author": "Ursula K. Le Guin",
            "oauth_provider_name": "github",
            "authority": "registrar",
            "auth": "basic xyz",
            "x_auth": "abc",
            "authKey": "k-1",
            "X-Auth-Token": "t-1",
            "proxyAuthorization": "Basic abc"
        });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["author"], "Ursula K. Le Guin");
        assert_eq!(out["oauth_provider_name"], "github");
        assert_eq!(out["authority"], "registrar");
        for key in ["auth", "x_auth", "authKey", "X-Auth-Token", "proxyAuthorization"] {
            assert_eq!(out[key], "[REDACTED]", "{key} should be redacted");
        }
    }

    #[test]
    fn clips_long_strings() {
        let input = serde_json::json!({"body": "a".repeat(2000)});
        let out = redact_sensitive_json(&input);
        let body = out["body"].as_str().unwrap();
        assert!(body.ends_with("...[truncated]"));
        assert!(body.len() < 600);
    }
}
