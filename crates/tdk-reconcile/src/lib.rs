//! tdk-reconcile
//!
//! Reconciliation scanner and findings review.
//!
//! - Audit rules are deterministic, pure functions of the ledger and a clock
//!   reading (`rules`).
//! - A scan persists each detected finding independently and never clears
//!   earlier ones. A finding already on record (same fingerprint, any status)
//!   is reused, never reopened.
//! - Review moves a finding forward exactly once: open -> acknowledged or
//!   open -> resolved.
//! - Aggregates are recomputed from the current finding set on every query.

mod review;
mod rules;
mod scanner;
mod scope;
mod summary;

pub use review::{validate_transition, ReviewError, ReviewRequest};
pub use rules::{audit, base_asset, fingerprint, AuditContext, FindingType};
pub use scanner::{
    FindingsStore, LedgerSource, ScanConfig, ScanError, ScanOutcome, ScanRequest, Scanner,
};
pub use scope::{parse_scope, scope_labels};
pub use summary::{summarize, FindingSummary};
