use chrono::{DateTime, Duration, Utc};
use tdk_lifecycle::{order_status, CanonicalStatus};
use tdk_schemas::{AlertType, Order};

use crate::cache::ObservedOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    /// Remaining time before the payment deadline that triggers payment_timer.
    pub payment: Duration,
    /// Remaining time before order expiry that triggers order_timer.
    pub order: Duration,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            payment: Duration::minutes(5),
            order: Duration::minutes(10),
        }
    }
}

/// True when `deadline - threshold` falls in `(since, now]` and the deadline
/// itself has not passed. `since = None` means the order was never seen.
fn crossed(
    deadline: Option<DateTime<Utc>>,
    threshold: Duration,
    since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(deadline) = deadline else {
        return false;
    };
    if now >= deadline {
        return false;
    }
    let mark = deadline - threshold;
    mark <= now && since.map_or(true, |s| mark > s)
}

/// Classify one order against its previous observation.
///
/// Output order is stable: new_order / info_update first, then timers.
pub fn classify(
    prev: Option<&ObservedOrder>,
    current: &Order,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Vec<AlertType> {
    let mut out = Vec::new();
    let status = order_status(current);

    match prev {
        None => out.push(AlertType::NewOrder),
        Some(p) => {
            let o = &p.order;
            let changed = o.counterparty != current.counterparty
                || o.amount != current.amount
                || o.asset != current.asset
                || o.fiat != current.fiat
                || p.status != status;
            if changed {
                out.push(AlertType::InfoUpdate);
            }
        }
    }

    let since = prev.map(|p| p.observed_at);
    if status == CanonicalStatus::PendingPayment
        && crossed(current.payment_deadline, thresholds.payment, since, now)
    {
        out.push(AlertType::PaymentTimer);
    }
    if !status.is_terminal() && crossed(current.expires_at, thresholds.order, since, now) {
        out.push(AlertType::OrderTimer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tdk_schemas::Side;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn order(raw_status: &str) -> Order {
        Order {
            id: "o1".to_string(),
            order_number: "1001".to_string(),
            side: Side::Buy,
            raw_status: raw_status.to_string(),
            amount: Some(dec!(100)),
            asset: Some("USDT".to_string()),
            fiat: Some("EUR".to_string()),
            counterparty: Some("bob".to_string()),
            payment_deadline: None,
            expires_at: None,
        }
    }

    fn th() -> AlertThresholds {
        AlertThresholds::default()
    }

    #[test]
    fn unseen_order_is_new() {
        assert_eq!(classify(None, &order("1"), t0(), &th()), vec![AlertType::NewOrder]);
    }

    #[test]
    fn unchanged_order_is_silent() {
        let prev = ObservedOrder::new(order("1"), t0());
        assert!(classify(Some(&prev), &order("1"), t0() + Duration::seconds(30), &th()).is_empty());
    }

    #[test]
    fn descriptive_or_status_change_is_info_update() {
        let prev = ObservedOrder::new(order("1"), t0());
        let mut cur = order("1");
        cur.counterparty = Some("carol".to_string());
        assert_eq!(classify(Some(&prev), &cur, t0(), &th()), vec![AlertType::InfoUpdate]);

        let cur = order("2");
        assert_eq!(classify(Some(&prev), &cur, t0(), &th()), vec![AlertType::InfoUpdate]);

        // Raw code changes that normalize to the same status are not updates.
        let cur = order("TRADING");
        assert!(classify(Some(&prev), &cur, t0(), &th()).is_empty());
    }

    #[test]
    fn payment_timer_fires_once_on_crossing() {
        let mut o = order("1");
        o.payment_deadline = Some(t0() + Duration::minutes(6));

        // 6 min remaining: above threshold.
        let prev = ObservedOrder::new(o.clone(), t0());
        let at = t0() + Duration::seconds(30);
        assert!(classify(Some(&prev), &o, at, &th()).is_empty());

        // 4m30s remaining: crossed since last poll.
        let prev = ObservedOrder::new(o.clone(), at);
        let at2 = t0() + Duration::seconds(90);
        assert_eq!(classify(Some(&prev), &o, at2, &th()), vec![AlertType::PaymentTimer]);

        // Already below on the previous poll: no repeat.
        let prev = ObservedOrder::new(o.clone(), at2);
        assert!(classify(Some(&prev), &o, at2 + Duration::seconds(30), &th()).is_empty());
    }

    #[test]
    fn payment_timer_requires_pending_payment() {
        let mut o = order("2"); // BUYER_PAYED on the buy side: Releasing
        o.payment_deadline = Some(t0() + Duration::minutes(6));
        let prev = ObservedOrder::new(o.clone(), t0());
        assert!(classify(Some(&prev), &o, t0() + Duration::minutes(2), &th()).is_empty());
    }

    #[test]
    fn order_timer_stops_at_terminal_states() {
        let mut live = order("3");
        live.expires_at = Some(t0() + Duration::minutes(11));
        let prev = ObservedOrder::new(live.clone(), t0());
        assert_eq!(
            classify(Some(&prev), &live, t0() + Duration::minutes(2), &th()),
            vec![AlertType::OrderTimer]
        );

        let mut done = order("4");
        done.expires_at = live.expires_at;
        let prev = ObservedOrder::new(done.clone(), t0());
        assert!(classify(Some(&prev), &done, t0() + Duration::minutes(2), &th()).is_empty());
    }

    #[test]
    fn new_order_already_inside_window_gets_timer_too() {
        let mut o = order("1");
        o.payment_deadline = Some(t0() + Duration::minutes(2));
        assert_eq!(
            classify(None, &o, t0(), &th()),
            vec![AlertType::NewOrder, AlertType::PaymentTimer]
        );
    }

    #[test]
    fn passed_deadline_never_fires() {
        let mut o = order("1");
        o.payment_deadline = Some(t0() - Duration::seconds(1));
        assert_eq!(classify(None, &o, t0(), &th()), vec![AlertType::NewOrder]);
    }
}
