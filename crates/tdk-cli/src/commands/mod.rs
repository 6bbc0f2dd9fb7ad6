//! Command handler modules for tdk-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod reconcile;
pub mod sync;

use anyhow::{Context, Result};
use serde::Serialize;
use tdk_config::{Component, EngineConfig, LoadedConfig, UnusedKeyPolicy};
use tdk_schemas::FindingStatus;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config from explicit `--config` paths, else from `TDK_CONFIG`.
/// Unused keys are reported on stderr and never fatal.
pub fn load_config(config_paths: &[String]) -> Result<(LoadedConfig, EngineConfig)> {
    let paths = if config_paths.is_empty() {
        tdk_config::config_paths_from_env()
    } else {
        config_paths.to_vec()
    };
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = tdk_config::load_layered_yaml(&path_refs)?;

    let report =
        tdk_config::report_unused_keys(Component::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        tracing::debug!(pointer = %p, "config key not used by cli");
    }

    let cfg = loaded.engine()?;
    Ok((loaded, cfg))
}

/// Parse a CLI `--status` string into a [`FindingStatus`].
pub fn parse_finding_status(status: &str) -> Result<FindingStatus> {
    Ok(FindingStatus::parse(status)?)
}

pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid {what} uuid: {raw}"))
}

pub fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(v).context("serialize output failed")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_status_parse_is_case_insensitive() {
        assert_eq!(parse_finding_status("Resolved").unwrap(), FindingStatus::Resolved);
        assert!(parse_finding_status("closed").is_err());
    }

    #[test]
    fn uuid_errors_name_the_argument() {
        let err = parse_uuid("nope", "finding").unwrap_err();
        assert!(err.to_string().contains("finding"));
    }
}
