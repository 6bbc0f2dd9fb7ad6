//! tdk-testkit
//!
//! In-memory stand-ins for every storage and network seam, plus fixtures.
//! No DB or network required; scenario tests under `tests/` compose the real
//! worker, scanner and dispatcher over these.

mod exchange;
mod findings;
mod ledger;

pub mod fixtures;

pub use exchange::{RecordingNotifier, ScriptedExchange, ScriptedOrderFeed};
pub use findings::MemoryFindingsStore;
pub use ledger::MemoryLedger;
