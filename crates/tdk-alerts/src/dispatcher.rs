use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tdk_schemas::OrderAlert;

use crate::kv::KeyValueStore;

/// Notification layer (SSE bus, desktop push, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &OrderAlert) -> anyhow::Result<()>;
}

/// The only effect of interacting with a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub order_id: String,
}

pub fn navigation_for(alert: &OrderAlert) -> Navigation {
    Navigation {
        order_id: alert.order_id.clone(),
    }
}

pub fn mute_key(user_id: &str) -> String {
    format!("alerts.muted.{user_id}")
}

/// Missing or non-boolean values read as unmuted.
pub async fn is_muted(kv: &dyn KeyValueStore, user_id: &str) -> anyhow::Result<bool> {
    Ok(matches!(kv.get(&mute_key(user_id)).await?, Some(Value::Bool(true))))
}

pub async fn set_muted(kv: &dyn KeyValueStore, user_id: &str, muted: bool) -> anyhow::Result<()> {
    kv.set(&mute_key(user_id), Value::Bool(muted)).await
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Dropped because the user was muted. Never replayed.
    pub suppressed: usize,
    pub failed: usize,
}

pub struct AlertDispatcher {
    kv: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    user_id: String,
}

impl AlertDispatcher {
    pub fn new(kv: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>, user_id: impl Into<String>) -> Self {
        Self {
            kv,
            notifier,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn muted(&self) -> anyhow::Result<bool> {
        is_muted(self.kv.as_ref(), &self.user_id).await
    }

    pub async fn set_muted(&self, muted: bool) -> anyhow::Result<()> {
        set_muted(self.kv.as_ref(), &self.user_id, muted).await
    }

    /// Deliver a batch of alerts.
    ///
    /// The mute flag is read fresh on every call. If it cannot be read the
    /// batch is delivered. A failing notifier is logged per alert and does
    /// not stop the rest of the batch.
    pub async fn dispatch(&self, alerts: &[OrderAlert]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if alerts.is_empty() {
            return report;
        }

        let muted = match self.muted().await {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(user_id = %self.user_id, error = %format!("{err:#}"), "mute flag unreadable; delivering");
                false
            }
        };
        if muted {
            report.suppressed = alerts.len();
            tracing::debug!(user_id = %self.user_id, suppressed = report.suppressed, "alerts muted");
            return report;
        }

        for alert in alerts {
            match self.notifier.notify(alert).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        order_id = %alert.order_id,
                        alert_type = alert.alert_type.as_str(),
                        error = %format!("{err:#}"),
                        "alert delivery failed"
                    );
                }
            }
        }
        report
    }
}
