//! Typed view over the merged config document.
//!
//! Every section and field has a default so a partial (or empty) document
//! still yields a runnable configuration. Unknown keys are ignored here; the
//! unused-key report is the place that flags them.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Postgres accepts at most 65535 bind parameters per statement and each
/// trade row binds 10.
pub const MAX_SYNC_BATCH_SIZE: usize = 6_553;

/// Upper bound for second-valued windows (staleness, alert thresholds).
pub const MAX_WINDOW_SECS: i64 = 10 * 366 * 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub exchange: ExchangeConfig,
    pub sync: SyncConfig,
    pub reconcile: ReconcileConfig,
    pub alerts: AlertsConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub engine_id: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            engine_id: "desk-main".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub keys_env: ExchangeKeysEnv,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9100".to_string(),
            timeout_secs: 10,
            keys_env: ExchangeKeysEnv::default(),
        }
    }
}

/// Env var NAMES, never values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExchangeKeysEnv {
    pub api_key: String,
}

impl Default for ExchangeKeysEnv {
    fn default() -> Self {
        Self {
            api_key: "TDK_EXCHANGE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    /// Written into `trades.source` for every ingested row.
    pub source: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_size: 50,
            source: "exchange".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Scheduled scan cadence. `None` or `0` disables scheduled scans.
    pub schedule_secs: Option<u64>,
    pub default_scope: Vec<String>,
    /// Newest ledger trade older than this raises a staleness finding.
    pub stale_after_secs: i64,
    /// Relative tolerance for quote_quantity vs quantity * price.
    pub quote_tolerance: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            schedule_secs: None,
            default_scope: vec!["all".to_string()],
            stale_after_secs: 86_400,
            quote_tolerance: Decimal::new(1, 3),
        }
    }
}

impl ReconcileConfig {
    pub fn schedule(&self) -> Option<u64> {
        self.schedule_secs.filter(|s| *s > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub poll_secs: u64,
    /// Fire payment_timer when remaining time before the payment deadline
    /// drops to this many seconds.
    pub payment_threshold_secs: i64,
    /// Fire order_timer when remaining time before expiry drops to this many seconds.
    pub order_threshold_secs: i64,
    /// Mute flag owner.
    pub user_id: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            poll_secs: 30,
            payment_threshold_secs: 300,
            order_threshold_secs: 600,
            user_id: "operator".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: EngineConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.sync.batch_size == 0 || self.sync.batch_size > MAX_SYNC_BATCH_SIZE {
            bail!("CONFIG_INVALID: sync.batch_size must be in 1..={MAX_SYNC_BATCH_SIZE}");
        }
        if self.sync.interval_secs == 0 {
            bail!("CONFIG_INVALID: sync.interval_secs must be > 0");
        }
        if self.alerts.poll_secs == 0 {
            bail!("CONFIG_INVALID: alerts.poll_secs must be > 0");
        }
        for (name, secs) in [
            ("payment_threshold_secs", self.alerts.payment_threshold_secs),
            ("order_threshold_secs", self.alerts.order_threshold_secs),
        ] {
            if !(0..=MAX_WINDOW_SECS).contains(&secs) {
                bail!("CONFIG_INVALID: alerts.{name} must be in 0..={MAX_WINDOW_SECS}");
            }
        }
        if self.reconcile.quote_tolerance.is_sign_negative() {
            bail!("CONFIG_INVALID: reconcile.quote_tolerance must be >= 0");
        }
        if !(1..=MAX_WINDOW_SECS).contains(&self.reconcile.stale_after_secs) {
            bail!("CONFIG_INVALID: reconcile.stale_after_secs must be in 1..={MAX_WINDOW_SECS}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = EngineConfig::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(cfg.sync.batch_size, 50);
        assert_eq!(cfg.sync.interval_secs, 60);
        assert_eq!(cfg.alerts.poll_secs, 30);
        assert_eq!(cfg.reconcile.quote_tolerance, dec!(0.001));
        assert_eq!(cfg.reconcile.schedule(), None);
        assert_eq!(cfg.exchange.keys_env.api_key, "TDK_EXCHANGE_API_KEY");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = EngineConfig::from_json(&serde_json::json!({
            "sync": { "batch_size": 10 },
            "reconcile": { "schedule_secs": 0, "quote_tolerance": "0.01" }
        }))
        .unwrap();
        assert_eq!(cfg.sync.batch_size, 10);
        assert_eq!(cfg.sync.interval_secs, 60);
        assert_eq!(cfg.reconcile.schedule(), None);
        assert_eq!(cfg.reconcile.quote_tolerance, dec!(0.01));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = EngineConfig::from_json(&serde_json::json!({"sync": {"batch_size": 0}}))
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn batch_size_above_bind_limit_is_rejected() {
        let ok = serde_json::json!({"sync": {"batch_size": MAX_SYNC_BATCH_SIZE}});
        assert!(EngineConfig::from_json(&ok).is_ok());
        let err = EngineConfig::from_json(&serde_json::json!({"sync": {"batch_size": 6_554}}))
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn out_of_range_windows_are_rejected() {
        for doc in [
            serde_json::json!({"reconcile": {"stale_after_secs": i64::MAX}}),
            serde_json::json!({"alerts": {"payment_threshold_secs": i64::MAX}}),
            serde_json::json!({"alerts": {"order_threshold_secs": -1}}),
        ] {
            let err = EngineConfig::from_json(&doc).unwrap_err();
            assert!(err.to_string().contains("CONFIG_INVALID"), "{doc}");
        }
    }
}
