use std::sync::Arc;

use tdk_alerts::OrderFeed;
use tdk_exchange::ExchangeClient;
use tdk_schemas::Order;

/// Order feed backed by the exchange `getOrders` action.
pub struct ExchangeOrderFeed {
    client: Arc<dyn ExchangeClient>,
}

impl ExchangeOrderFeed {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl OrderFeed for ExchangeOrderFeed {
    async fn list_orders(&self) -> anyhow::Result<Vec<Order>> {
        let fetched = self.client.fetch_orders().await?;
        for r in &fetched.rejected {
            tracing::warn!(index = r.index, reason = ?r.reason, "order record rejected");
        }
        Ok(fetched.orders)
    }
}
