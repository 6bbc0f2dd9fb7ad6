//! Layered loading: hash stability, literal-secret guard, unused-key report,
//! and the typed view over the merged document.

use tdk_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, Component,
    UnusedKeyPolicy,
};

const BASE_YAML: &str = r#"
engine:
  engine_id: "desk-main"
exchange:
  base_url: "http://127.0.0.1:9100"
  keys_env:
    api_key: "TDK_EXCHANGE_API_KEY"
sync:
  interval_secs: 60
  batch_size: 50
alerts:
  poll_secs: 30
"#;

const BASE_YAML_REORDERED: &str = r#"
alerts:
  poll_secs: 30
sync:
  batch_size: 50
  interval_secs: 60
exchange:
  keys_env:
    api_key: "TDK_EXCHANGE_API_KEY"
  base_url: "http://127.0.0.1:9100"
engine:
  engine_id: "desk-main"
"#;

const OVERLAY_YAML: &str = r#"
sync:
  interval_secs: 5
"#;

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn overlay_changes_hash_and_value() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.engine().unwrap();
    assert_eq!(cfg.sync.interval_secs, 5);
    assert_eq!(cfg.sync.batch_size, 50);
}

#[test]
fn literal_secret_is_rejected() {
    let yaml = r#"
exchange:
  keys_env:
    api_key: "sk-live-abc123secretvalue"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "got: {err}");
    assert!(!err.contains("abc123secretvalue"), "secret leaked: {err}");
}

#[test]
fn cli_does_not_consume_alerts_or_daemon_keys() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let report =
        report_unused_keys(Component::Cli, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/alerts/poll_secs".to_string()]);

    let err = report_unused_keys(Component::Cli, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_UNUSED_KEYS"));

    let daemon =
        report_unused_keys(Component::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(daemon.is_clean());
}

#[test]
fn stray_key_is_reported_for_daemon() {
    let yaml = r#"
sync:
  interval_secs: 60
payroll:
  enabled: true
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(Component::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/payroll/enabled".to_string()]);
}

#[test]
fn shipped_base_config_loads_and_is_clean_for_daemon() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/base.yaml");
    let loaded = load_layered_yaml(&[path]).unwrap();
    let cfg = loaded.engine().unwrap();
    assert_eq!(cfg.sync.batch_size, 50);
    assert_eq!(cfg.reconcile.schedule(), None);

    let report =
        report_unused_keys(Component::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}
