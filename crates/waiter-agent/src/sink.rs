//! Where finished orders go.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use waiter_menu::Order;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("order backend unreachable: {0}")]
    Transport(String),

    #[error("order backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("order sink rejected the order: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Persistence collaborator for order snapshots.
#[async_trait]
pub trait OrderSink: fmt::Debug + Send + Sync {
    async fn persist(&self, call_id: &str, order: &Order) -> Result<(), SinkError>;
}

/// Posts snapshots to `{base_url}/api/get-order-item/{call_id}/`.
#[derive(Debug, Clone)]
pub struct HttpOrderSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderSink {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, call_id: &str) -> String {
        format!("{}/api/get-order-item/{}/", self.base_url, call_id)
    }
}

#[async_trait]
impl OrderSink for HttpOrderSink {
    async fn persist(&self, call_id: &str, order: &Order) -> Result<(), SinkError> {
        let url = self.endpoint(call_id);
        debug!(%call_id, %url, items = order.item_count(), "posting order");

        let response = self.client.post(&url).json(order).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        info!(%call_id, total = order.total, "order forwarded to backend");
        Ok(())
    }
}

/// Keeps orders in memory. Used when no backend is configured, and in tests.
#[derive(Default)]
pub struct MemoryOrderSink {
    orders: Mutex<Vec<(String, Order)>>,
    failing: AtomicBool,
}

impl MemoryOrderSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `persist` fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Orders persisted so far, with their call ids.
    pub fn orders(&self) -> Vec<(String, Order)> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for MemoryOrderSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryOrderSink")
            .field("orders", &self.orders().len())
            .field("failing", &self.failing.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl OrderSink for MemoryOrderSink {
    async fn persist(&self, call_id: &str, order: &Order) -> Result<(), SinkError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SinkError::Rejected("sink is failing".to_string()));
        }
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((call_id.to_string(), order.clone()));
        debug!(%call_id, items = order.item_count(), "order kept in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use waiter_menu::{Menu, OrderStore};

    #[test]
    fn endpoint_includes_call_id() {
        let sink = HttpOrderSink::with_client(reqwest::Client::new(), "http://backend:8000/");
        assert_eq!(
            sink.endpoint("call_42"),
            "http://backend:8000/api/get-order-item/call_42/"
        );
    }

    #[tokio::test]
    async fn memory_sink_records_and_fails_on_demand() {
        let mut store = OrderStore::new(Arc::new(Menu::sample()));
        store.add("wings", 2, "").unwrap();
        let sink = MemoryOrderSink::new();

        sink.persist("c1", &store.snapshot()).await.unwrap();
        sink.set_failing(true);
        assert!(sink.persist("c1", &store.snapshot()).await.is_err());

        let orders = sink.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].0, "c1");
        assert_eq!(orders[0].1.item_count(), 2);
    }
}
