//! tdk-runtime
//!
//! Process wiring shared by the daemon and the CLI: the cancellable job
//! scheduler, Postgres adapters for the storage traits, the exchange-backed
//! order feed and the [`Engine`] composition root.

mod engine;
mod feed;
mod jobs;
mod pg;
mod scheduler;

pub use engine::{
    alert_thresholds, exchange_client, scan_config, Engine, EngineParts, RunningEngine,
};
pub use feed::ExchangeOrderFeed;
pub use jobs::{AlertJob, ScanJob, SyncJob, SCHEDULED_TRIGGER};
pub use pg::{PgFindingsStore, PgLedger, PgSettingsKv, SYNC_RETRY_FLOOR_KEY};
pub use scheduler::{JobHandle, PeriodicJob, Scheduler};
