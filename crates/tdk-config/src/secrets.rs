//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES. Binaries call [`resolve_secrets`]
//! once at startup and pass the result into constructors. `Debug` redacts
//! values; error messages mention the var name, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

const DEFAULT_EXCHANGE_KEY_VAR: &str = "TDK_EXCHANGE_API_KEY";

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Exchange bearer key. `None` when the named env var is absent or empty.
    pub exchange_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "exchange_api_key",
                &self.exchange_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

fn read_str_at(config_json: &Value, pointer: &str) -> Option<String> {
    config_json
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn resolve_env(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Name of the env var holding the exchange key.
pub fn exchange_key_var(config_json: &Value) -> String {
    read_str_at(config_json, "/exchange/keys_env/api_key")
        .unwrap_or_else(|| DEFAULT_EXCHANGE_KEY_VAR.to_string())
}

/// Resolve all secrets. With `require_exchange_key`, a missing key fails
/// closed naming the variable.
pub fn resolve_secrets(config_json: &Value, require_exchange_key: bool) -> Result<ResolvedSecrets> {
    let var = exchange_key_var(config_json);
    let exchange_api_key = resolve_env(&var);
    if require_exchange_key && exchange_api_key.is_none() {
        bail!("SECRETS_MISSING: required env var '{var}' (exchange api_key) is not set or empty");
    }
    Ok(ResolvedSecrets { exchange_api_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let s = ResolvedSecrets {
            exchange_api_key: Some("super-secret-value".to_string()),
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(dbg.contains("<REDACTED>"));
    }

    #[test]
    fn key_var_falls_back_to_default_name() {
        assert_eq!(exchange_key_var(&serde_json::json!({})), "TDK_EXCHANGE_API_KEY");
        let cfg = serde_json::json!({"exchange": {"keys_env": {"api_key": "DESK_KEY"}}});
        assert_eq!(exchange_key_var(&cfg), "DESK_KEY");
    }

    #[test]
    fn missing_required_key_names_the_var_only() {
        let cfg = serde_json::json!({
            "exchange": {"keys_env": {"api_key": "TDK_SECRETS_SENTINEL_NEVER_SET_4471"}}
        });
        let err = resolve_secrets(&cfg, true).unwrap_err().to_string();
        assert!(err.contains("SECRETS_MISSING"));
        assert!(err.contains("TDK_SECRETS_SENTINEL_NEVER_SET_4471"));

        let ok = resolve_secrets(&cfg, false).unwrap();
        assert!(ok.exchange_api_key.is_none());
    }
}
