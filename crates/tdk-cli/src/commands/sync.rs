//! `tdk sync once`: one ingestion cycle against the configured exchange.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tdk_config::secrets::resolve_secrets;
use tdk_runtime::PgLedger;
use tdk_schemas::EngineError;
use tdk_sync::{CycleOutcome, TradeSyncWorker};

use super::{load_config, print_json};

pub async fn sync_once(pool: PgPool, config_paths: &[String]) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths)?;
    let secrets = resolve_secrets(&loaded.config_json, false)?;
    let exchange = Arc::new(tdk_runtime::exchange_client(&cfg, &secrets));

    let worker = TradeSyncWorker::new(exchange, Arc::new(PgLedger::new(pool)))
        .with_batch_size(cfg.sync.batch_size);

    match worker.run_cycle().await.map_err(EngineError::from)? {
        CycleOutcome::Skipped => println!("sync_ran=false"),
        CycleOutcome::Completed(report) => {
            println!("sync_ran=true");
            print_json(&report)?;
        }
    }
    Ok(())
}
