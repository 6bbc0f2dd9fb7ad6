//! Audit rules. Deterministic, pure logic: same ledger + same clock reading
//! always yield the same findings in the same order.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tdk_schemas::{AuditDomain, NewFinding, Severity, Side, TradeRecord};

/// Quote assets recognised when deriving the base asset of a symbol.
/// Longest first so `FDUSD` wins over `USD`.
const QUOTE_ASSETS: &[&str] = &[
    "FDUSD", "USDT", "USDC", "BUSD", "TUSD", "BTC", "ETH", "BNB", "EUR", "USD", "TRY", "BRL",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingType {
    NonPositiveQuantity,
    NonPositivePrice,
    QuoteQtyMismatch,
    NegativeCommission,
    CommissionAssetMissing,
    FutureExecution,
    AmountOverflow,
    NegativeInventory,
    InventoryOverflow,
    EmptyLedger,
    StaleLedger,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::NonPositiveQuantity => "NON_POSITIVE_QUANTITY",
            FindingType::NonPositivePrice => "NON_POSITIVE_PRICE",
            FindingType::QuoteQtyMismatch => "QUOTE_QTY_MISMATCH",
            FindingType::NegativeCommission => "NEGATIVE_COMMISSION",
            FindingType::CommissionAssetMissing => "COMMISSION_ASSET_MISSING",
            FindingType::FutureExecution => "FUTURE_EXECUTION",
            FindingType::AmountOverflow => "AMOUNT_OVERFLOW",
            FindingType::NegativeInventory => "NEGATIVE_INVENTORY",
            FindingType::InventoryOverflow => "INVENTORY_OVERFLOW",
            FindingType::EmptyLedger => "EMPTY_LEDGER",
            FindingType::StaleLedger => "STALE_LEDGER",
        }
    }

    pub fn domain(&self) -> AuditDomain {
        match self {
            FindingType::NonPositiveQuantity
            | FindingType::NonPositivePrice
            | FindingType::QuoteQtyMismatch
            | FindingType::NegativeCommission
            | FindingType::CommissionAssetMissing
            | FindingType::FutureExecution
            | FindingType::AmountOverflow => AuditDomain::Trades,
            FindingType::NegativeInventory | FindingType::InventoryOverflow => {
                AuditDomain::Positions
            }
            FindingType::EmptyLedger | FindingType::StaleLedger => AuditDomain::Sync,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FindingType::NonPositiveQuantity
            | FindingType::NonPositivePrice
            | FindingType::FutureExecution
            | FindingType::AmountOverflow
            | FindingType::NegativeInventory
            | FindingType::InventoryOverflow => Severity::Critical,
            FindingType::QuoteQtyMismatch
            | FindingType::NegativeCommission
            | FindingType::StaleLedger => Severity::Warning,
            FindingType::CommissionAssetMissing | FindingType::EmptyLedger => Severity::Info,
        }
    }
}

/// Inputs to the rules besides the ledger itself.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub now: DateTime<Utc>,
    /// Max relative deviation of quote_quantity from quantity * price.
    pub quote_tolerance: Decimal,
    /// Newest trade older than this is stale.
    pub stale_after: Duration,
    /// Executions up to this far ahead of `now` are not flagged as future.
    pub clock_skew: Duration,
}

/// `domain:finding_type:asset:evidence`
pub fn fingerprint(kind: FindingType, asset: &str, evidence: &str) -> String {
    format!("{}:{}:{}:{}", kind.domain().as_str(), kind.as_str(), asset, evidence)
}

fn finding(kind: FindingType, asset: &str, evidence: &str, detail: String) -> NewFinding {
    NewFinding {
        category: kind.domain(),
        severity: kind.severity(),
        finding_type: kind.as_str().to_string(),
        asset: asset.to_string(),
        detail,
        fingerprint: fingerprint(kind, asset, evidence),
    }
}

/// Base asset of a trading pair, e.g. `BTCUSDT` -> `BTC`. Symbols without a
/// recognised quote suffix are returned unchanged.
pub fn base_asset(symbol: &str) -> String {
    let upper = symbol.trim().to_ascii_uppercase();
    for quote in QUOTE_ASSETS {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    upper
}

/// Run the rules of every requested domain.
pub fn audit(domains: &[AuditDomain], trades: &[TradeRecord], ctx: &AuditContext) -> Vec<NewFinding> {
    let wanted: BTreeSet<AuditDomain> = domains.iter().copied().collect();
    let mut out = Vec::new();
    if wanted.contains(&AuditDomain::Trades) {
        audit_trades(trades, ctx, &mut out);
    }
    if wanted.contains(&AuditDomain::Positions) {
        audit_positions(trades, &mut out);
    }
    if wanted.contains(&AuditDomain::Sync) {
        audit_sync(trades, ctx, &mut out);
    }

    out.sort();
    out.dedup_by(|a, b| a.fingerprint == b.fingerprint);
    out
}

// ---------------------------------------------------------------------------
// trades
// ---------------------------------------------------------------------------

fn audit_trades(trades: &[TradeRecord], ctx: &AuditContext, out: &mut Vec<NewFinding>) {
    for t in trades {
        let id = t.external_trade_id.as_str();
        let sym = t.symbol.as_str();

        if t.quantity <= Decimal::ZERO {
            out.push(finding(
                FindingType::NonPositiveQuantity,
                sym,
                id,
                format!("trade {id}: quantity {} is not positive", t.quantity),
            ));
        }
        if t.price <= Decimal::ZERO {
            out.push(finding(
                FindingType::NonPositivePrice,
                sym,
                id,
                format!("trade {id}: price {} is not positive", t.price),
            ));
        }
        if t.quantity > Decimal::ZERO && t.price > Decimal::ZERO {
            let expected = t.quantity.checked_mul(t.price);
            let diff = expected.and_then(|e| t.quote_quantity.checked_sub(e));
            match (expected, diff) {
                (Some(expected), Some(diff)) => {
                    let deviation = diff.abs().checked_div(expected);
                    if matches!(deviation, Some(d) if d > ctx.quote_tolerance) {
                        out.push(finding(
                            FindingType::QuoteQtyMismatch,
                            sym,
                            id,
                            format!(
                                "trade {id}: quote_quantity {} differs from quantity * price {}",
                                t.quote_quantity,
                                expected.normalize()
                            ),
                        ));
                    }
                }
                _ => out.push(finding(
                    FindingType::AmountOverflow,
                    sym,
                    id,
                    format!(
                        "trade {id}: quantity {} * price {} vs quote_quantity {} is out of range",
                        t.quantity, t.price, t.quote_quantity
                    ),
                )),
            }
        }
        if t.commission < Decimal::ZERO {
            out.push(finding(
                FindingType::NegativeCommission,
                sym,
                id,
                format!("trade {id}: commission {} is negative", t.commission),
            ));
        }
        if t.commission > Decimal::ZERO && t.commission_asset.trim().is_empty() {
            out.push(finding(
                FindingType::CommissionAssetMissing,
                sym,
                id,
                format!("trade {id}: commission {} charged without asset", t.commission),
            ));
        }
        if t.executed_at > ctx.now + ctx.clock_skew {
            out.push(finding(
                FindingType::FutureExecution,
                sym,
                id,
                format!(
                    "trade {id}: executed_at {} is in the future",
                    t.executed_at.to_rfc3339()
                ),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// positions
// ---------------------------------------------------------------------------

/// Net inventory per base asset must never dip below zero when the ledger is
/// replayed in execution order. Reports the first offending trade per asset.
/// An asset whose running total leaves the decimal range is reported once and
/// no longer replayed.
fn audit_positions(trades: &[TradeRecord], out: &mut Vec<NewFinding>) {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));

    let mut net: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut flagged: BTreeSet<String> = BTreeSet::new();
    let mut overflowed: BTreeSet<String> = BTreeSet::new();

    for t in ordered {
        let asset = base_asset(&t.symbol);
        if overflowed.contains(&asset) {
            continue;
        }
        let pos = net.entry(asset.clone()).or_insert(Decimal::ZERO);
        let next = match t.side {
            Side::Buy => pos.checked_add(t.quantity),
            Side::Sell => pos.checked_sub(t.quantity),
        };
        let Some(next) = next else {
            out.push(finding(
                FindingType::InventoryOverflow,
                &asset,
                &t.external_trade_id,
                format!(
                    "net {asset} inventory out of range at trade {} (quantity {})",
                    t.external_trade_id, t.quantity
                ),
            ));
            overflowed.insert(asset);
            continue;
        };
        *pos = next;
        if *pos < Decimal::ZERO && !flagged.contains(&asset) {
            out.push(finding(
                FindingType::NegativeInventory,
                &asset,
                &t.external_trade_id,
                format!(
                    "net {asset} inventory {} after sell {} (insufficient stock)",
                    pos.normalize(),
                    t.external_trade_id
                ),
            ));
            flagged.insert(asset);
        }
    }
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

fn audit_sync(trades: &[TradeRecord], ctx: &AuditContext, out: &mut Vec<NewFinding>) {
    let Some(newest) = trades.iter().map(|t| t.executed_at).max() else {
        out.push(finding(
            FindingType::EmptyLedger,
            "ledger",
            "empty",
            "ledger holds no trades".to_string(),
        ));
        return;
    };

    let age = ctx.now - newest;
    if age > ctx.stale_after {
        out.push(finding(
            FindingType::StaleLedger,
            "ledger",
            &newest.timestamp_millis().to_string(),
            format!(
                "newest trade executed {} ({}s ago, limit {}s)",
                newest.to_rfc3339(),
                age.num_seconds(),
                ctx.stale_after.num_seconds()
            ),
        ));
    }
}
