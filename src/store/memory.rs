//! In-memory datastore used by tests in place of Firebase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::{Map, Value};

use super::datastore::{last_by_child, Datastore};
use super::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryDatastore {
    root: Mutex<Value>,
    next_push: AtomicU64,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, path: &str) -> Option<Value> {
        let root = self.root.lock().unwrap_or_else(|e| e.into_inner());
        let mut node = &*root;
        for seg in segments(path) {
            node = node.get(seg)?;
        }
        (!node.is_null()).then(|| node.clone())
    }

    fn write(&self, path: &str, value: Value) {
        let mut root = self.root.lock().unwrap_or_else(|e| e.into_inner());
        let mut node = &mut *root;
        for seg in segments(path) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("node was just made an object")
            };
            node = map.entry(seg.to_string()).or_insert(Value::Null);
        }
        *node = value;
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read(path))
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.write(path, value.clone());
        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        // Zero-padded so lexical order matches insertion order, like Firebase push IDs.
        let key = format!("-{:019}", self.next_push.fetch_add(1, Ordering::SeqCst));
        self.write(&format!("{}/{}", path, key), value.clone());
        Ok(key)
    }

    async fn query_last(
        &self,
        path: &str,
        order_by: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let entries = match self.read(path) {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(_) | None => Vec::new(),
        };
        Ok(last_by_child(entries, order_by, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get_nested() {
        let db = MemoryDatastore::new();
        db.set("marsPhotos/1", &json!({"id": "1"})).await.unwrap();
        assert_eq!(
            db.get("marsPhotos/1").await.unwrap(),
            Some(json!({"id": "1"}))
        );
        assert_eq!(
            db.get("marsPhotos").await.unwrap(),
            Some(json!({"1": {"id": "1"}}))
        );
        assert_eq!(db.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_appends_with_increasing_keys() {
        let db = MemoryDatastore::new();
        let a = db.push("history/x", &json!(1)).await.unwrap();
        let b = db.push("history/x", &json!(2)).await.unwrap();
        assert!(b > a);
        let all = db.get("history/x").await.unwrap().unwrap();
        assert_eq!(all.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_scalar_overwrites() {
        let db = MemoryDatastore::new();
        db.set("rolls", &json!(1)).await.unwrap();
        db.set("rolls", &json!(2)).await.unwrap();
        assert_eq!(db.get("rolls").await.unwrap(), Some(json!(2)));
    }
}
