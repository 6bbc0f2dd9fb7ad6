use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tdk_schemas::{FindingStatus, ReconciliationFinding};

/// Read-side aggregate over the finding set. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub total: i64,
    pub open: i64,
    pub acknowledged: i64,
    pub resolved: i64,
    /// Open findings per category label.
    pub open_by_category: BTreeMap<String, i64>,
    /// Open findings per severity label.
    pub open_by_severity: BTreeMap<String, i64>,
}

pub fn summarize(findings: &[ReconciliationFinding]) -> FindingSummary {
    findings.iter().fold(FindingSummary::default(), |mut acc, f| {
        acc.total += 1;
        match f.status {
            FindingStatus::Open => {
                acc.open += 1;
                *acc
                    .open_by_category
                    .entry(f.category.as_str().to_string())
                    .or_insert(0) += 1;
                *acc
                    .open_by_severity
                    .entry(f.severity.as_str().to_string())
                    .or_insert(0) += 1;
            }
            FindingStatus::Acknowledged => acc.acknowledged += 1,
            FindingStatus::Resolved => acc.resolved += 1,
        }
        acc
    })
}
