use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::anyhow;
use serde_json::Value;
use tokio::sync::broadcast;

/// A key written through [`KeyValueStore::set`].
#[derive(Debug, Clone, PartialEq)]
pub struct KvChange {
    pub key: String,
    pub value: Value,
}

/// Client-durable key/value capability (mute flags, order defaults).
///
/// Values are opaque JSON. `subscribe` delivers every subsequent `set`.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<KvChange>;
}

/// Process-local store. Fresh per test.
pub struct MemoryKeyValueStore {
    map: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<KvChange>,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        let (changes, _rx) = broadcast::channel(64);
        Self {
            map: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let map = self.map.read().map_err(|_| anyhow!("kv lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        {
            let mut map = self.map.write().map_err(|_| anyhow!("kv lock poisoned"))?;
            map.insert(key.to_string(), value.clone());
        }
        // No subscribers is fine.
        let _ = self.changes.send(KvChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KvChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_is_visible_and_broadcast() {
        let kv = MemoryKeyValueStore::new();
        let mut rx = kv.subscribe();
        assert_eq!(kv.get("k").await.unwrap(), None);

        kv.set("k", Value::Bool(true)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(Value::Bool(true)));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "k");
        assert_eq!(change.value, Value::Bool(true));
    }
}
