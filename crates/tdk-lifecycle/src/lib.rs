//! tdk-lifecycle
//!
//! Status normalizer: maps heterogeneous exchange status signals onto one
//! canonical order lifecycle.
//!
//! Two stages:
//! 1. raw code -> canonical uppercase token (fixed numeric lookup, otherwise
//!    trimmed + uppercased passthrough)
//! 2. (token, side) -> [`CanonicalStatus`] via ordered substring rules, first
//!    match wins
//!
//! Pure and deterministic. No IO, no state.

use serde::{Deserialize, Serialize};
use tdk_schemas::{Order, Side};

// ---------------------------------------------------------------------------
// Canonical lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    #[serde(rename = "Releasing")]
    Releasing,
    #[serde(rename = "Pending Release")]
    PendingRelease,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(rename = "Under Appeal")]
    UnderAppeal,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 7] = [
        CanonicalStatus::PendingPayment,
        CanonicalStatus::Releasing,
        CanonicalStatus::PendingRelease,
        CanonicalStatus::Completed,
        CanonicalStatus::Cancelled,
        CanonicalStatus::Expired,
        CanonicalStatus::UnderAppeal,
    ];

    /// Human-facing label, identical to the serde representation.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalStatus::PendingPayment => "Pending Payment",
            CanonicalStatus::Releasing => "Releasing",
            CanonicalStatus::PendingRelease => "Pending Release",
            CanonicalStatus::Completed => "Completed",
            CanonicalStatus::Cancelled => "Cancelled",
            CanonicalStatus::Expired => "Expired",
            CanonicalStatus::UnderAppeal => "Under Appeal",
        }
    }

    /// Terminal states never transition again and never carry timers.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CanonicalStatus::Completed | CanonicalStatus::Cancelled | CanonicalStatus::Expired
        )
    }
}

impl std::fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Stage 1: raw code -> token
// ---------------------------------------------------------------------------

/// Numeric status codes reported by the exchange.
const STATUS_CODES: &[(&str, &str)] = &[
    ("1", "TRADING"),
    ("2", "BUYER_PAYED"),
    ("3", "DISTRIBUTING"),
    ("4", "COMPLETED"),
    ("5", "IN_APPEAL"),
    ("6", "CANCELLED"),
    ("7", "CANCELLED_BY_SYSTEM"),
];

/// Canonical uppercase token for a raw status.
///
/// Known numeric codes resolve through the lookup table. Anything else is
/// passed through trimmed and uppercased.
pub fn canonical_token(raw: &str) -> String {
    let trimmed = raw.trim();
    STATUS_CODES
        .iter()
        .find(|(code, _)| *code == trimmed)
        .map(|(_, token)| (*token).to_string())
        .unwrap_or_else(|| trimmed.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Stage 2: (token, side) -> lifecycle
// ---------------------------------------------------------------------------

fn contains_any(token: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| token.contains(n))
}

/// Map a canonical token and side onto the lifecycle.
///
/// Rule order matters: terminal states are side-agnostic and checked first,
/// so `CANCELLED_BY_SYSTEM` lands on Expired rather than Cancelled.
pub fn status_for_token(token: &str, side: Side) -> CanonicalStatus {
    if token.contains("COMPLETE") {
        return CanonicalStatus::Completed;
    }
    if contains_any(token, &["EXPIRE", "TIMEOUT", "BY_SYSTEM"]) {
        return CanonicalStatus::Expired;
    }
    if token.contains("CANCEL") {
        return CanonicalStatus::Cancelled;
    }
    if token.contains("APPEAL") {
        return CanonicalStatus::UnderAppeal;
    }
    // A label already in canonical form maps to itself.
    if contains_any(token, &["PENDING RELEASE", "PENDING_RELEASE"]) {
        return CanonicalStatus::PendingRelease;
    }
    if contains_any(token, &["PAYED", "PAID"]) {
        // Seller must release once the buyer has paid; on the buy side the
        // counterparty is releasing.
        return match side {
            Side::Sell => CanonicalStatus::PendingRelease,
            Side::Buy => CanonicalStatus::Releasing,
        };
    }
    if contains_any(token, &["DISTRIBUTING", "RELEASING"]) {
        return CanonicalStatus::Releasing;
    }
    CanonicalStatus::PendingPayment
}

/// `canonical_status(raw_status, side)`: both stages in one call.
pub fn canonical_status(raw_status: &str, side: Side) -> CanonicalStatus {
    status_for_token(&canonical_token(raw_status), side)
}

/// Derived lifecycle status of an order.
pub fn order_status(order: &Order) -> CanonicalStatus {
    canonical_status(&order.raw_status, order.side)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDES: [Side; 2] = [Side::Buy, Side::Sell];

    #[test]
    fn numeric_codes_resolve_through_table() {
        assert_eq!(canonical_token("1"), "TRADING");
        assert_eq!(canonical_token(" 2 "), "BUYER_PAYED");
        assert_eq!(canonical_token("7"), "CANCELLED_BY_SYSTEM");
    }

    #[test]
    fn unknown_input_is_trimmed_and_uppercased() {
        assert_eq!(canonical_token("  buyer_payed "), "BUYER_PAYED");
        assert_eq!(canonical_token("99"), "99");
        assert_eq!(canonical_token(""), "");
    }

    #[test]
    fn buyer_payed_is_side_asymmetric() {
        assert_eq!(
            canonical_status("BUYER_PAYED", Side::Sell),
            CanonicalStatus::PendingRelease
        );
        assert_eq!(
            canonical_status("BUYER_PAYED", Side::Buy),
            CanonicalStatus::Releasing
        );
        assert_eq!(canonical_status("2", Side::Sell), CanonicalStatus::PendingRelease);
        assert_eq!(canonical_status("paid", Side::Buy), CanonicalStatus::Releasing);
    }

    #[test]
    fn terminal_states_ignore_side() {
        for side in SIDES {
            assert_eq!(canonical_status("4", side), CanonicalStatus::Completed);
            assert_eq!(canonical_status("6", side), CanonicalStatus::Cancelled);
            assert_eq!(canonical_status("7", side), CanonicalStatus::Expired);
            assert_eq!(canonical_status("ORDER_TIMEOUT", side), CanonicalStatus::Expired);
            assert_eq!(canonical_status("expired", side), CanonicalStatus::Expired);
            assert_eq!(canonical_status("5", side), CanonicalStatus::UnderAppeal);
        }
    }

    #[test]
    fn releasing_and_default() {
        for side in SIDES {
            assert_eq!(canonical_status("3", side), CanonicalStatus::Releasing);
            assert_eq!(canonical_status("RELEASING", side), CanonicalStatus::Releasing);
            assert_eq!(canonical_status("1", side), CanonicalStatus::PendingPayment);
            assert_eq!(canonical_status("", side), CanonicalStatus::PendingPayment);
            assert_eq!(canonical_status("whatever", side), CanonicalStatus::PendingPayment);
        }
    }

    #[test]
    fn normalizer_is_deterministic_and_idempotent() {
        let raws = [
            "1", "2", "3", "4", "5", "6", "7", "8", "", " ", "TRADING", "BUYER_PAYED", "paid",
            "DISTRIBUTING", "COMPLETED", "IN_APPEAL", "CANCELLED", "CANCELLED_BY_SYSTEM",
            "timeout", "expired", "releasing", "garbage",
        ];
        for raw in raws {
            for side in SIDES {
                let first = canonical_status(raw, side);
                assert_eq!(first, canonical_status(raw, side), "raw={raw:?} side={side}");
                // Feeding the label back in yields the same status.
                assert_eq!(
                    canonical_status(first.label(), side),
                    first,
                    "raw={raw:?} side={side}"
                );
            }
        }
    }

    #[test]
    fn every_label_is_a_fixed_point() {
        for status in CanonicalStatus::ALL {
            for side in SIDES {
                assert_eq!(canonical_status(status.label(), side), status);
            }
        }
    }

    #[test]
    fn serde_uses_label() {
        let s = serde_json::to_string(&CanonicalStatus::PendingRelease).unwrap();
        assert_eq!(s, "\"Pending Release\"");
        let back: CanonicalStatus = serde_json::from_str("\"Under Appeal\"").unwrap();
        assert_eq!(back, CanonicalStatus::UnderAppeal);
    }

    #[test]
    fn terminal_flags() {
        assert!(CanonicalStatus::Completed.is_terminal());
        assert!(CanonicalStatus::Expired.is_terminal());
        assert!(!CanonicalStatus::UnderAppeal.is_terminal());
        assert!(!CanonicalStatus::PendingPayment.is_terminal());
    }
}
