//! Remote persistence for saved photo pairs, their history, and the roll
//! counter.
//!
//! Layout inside the datastore:
//! - `marsPhotos/<id>`, `picsumPhotos/<id>`: latest copy of each saved record
//! - `history/marsPhotos/<push key>`, `history/picsumPhotos/<push key>`:
//!   append-only log of every save
//! - `rolls`: bare integer
//!
//! Read failures are logged and reported as "nothing saved" (`None` / 0), so
//! callers cannot tell an empty store from an unreachable one.

pub mod datastore;
pub mod error;
#[cfg(test)]
pub mod memory;

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use datastore::{Datastore, FirebaseDatastore};
pub use error::StoreError;

use crate::photos::{MarsPhoto, PhotoRecord, StoredRecord};

/// Key holding the roll counter.
pub const ROLLS_KEY: &str = "rolls";

const HISTORY_ROOT: &str = "history";
const SAVED_AT_FIELD: &str = "savedAt";

/// Named record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    MarsPhotos,
    PicsumPhotos,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::MarsPhotos => "marsPhotos",
            Collection::PicsumPhotos => "picsumPhotos",
        }
    }

    pub fn history_path(&self) -> String {
        format!("{}/{}", HISTORY_ROOT, self.as_str())
    }

    fn record_path(&self, id: &str) -> String {
        format!("{}/{}", self.as_str(), id)
    }
}

pub struct RemoteStore {
    backend: Arc<dyn Datastore>,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore").finish_non_exhaustive()
    }
}

impl RemoteStore {
    pub fn new(backend: Arc<dyn Datastore>) -> Self {
        Self { backend }
    }

    /// Stamp every record with one shared `savedAt`, write each under its id,
    /// and append a copy to the collection's history.
    ///
    /// Every record is serialized before the first write, so a record that
    /// cannot be encoded aborts the save with nothing written. After that all
    /// writes are attempted even if an earlier one fails; the first error is
    /// returned. On success returns the timestamp that was applied.
    pub async fn save(
        &self,
        records: &mut [(Collection, &mut dyn StoredRecord)],
    ) -> Result<i64, StoreError> {
        let saved_at = Utc::now().timestamp_millis();
        for (_, record) in records.iter_mut() {
            record.stamp(saved_at);
        }

        let encoded = records
            .iter()
            .map(|(collection, record)| -> Result<_, StoreError> {
                let value = record.to_value()?;
                Ok((collection.record_path(record.id()), collection.history_path(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut first_err: Option<StoreError> = None;
        for (path, history, value) in &encoded {
            if let Err(e) = self.backend.set(path, value).await {
                tracing::warn!(path = %path, "Failed to save record: {}", e);
                first_err.get_or_insert(e);
            }

            match self.backend.push(history, value).await {
                Ok(key) => tracing::debug!(path = %history, key = %key, "Appended to history"),
                Err(e) => {
                    tracing::warn!(path = %history, "Failed to append history: {}", e);
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                tracing::info!(saved_at, count = records.len(), "Saved photos");
                Ok(saved_at)
            }
        }
    }

    /// Save a Mars/Picsum pair; both end up with the same `savedAt`.
    pub async fn save_pair(
        &self,
        mars: &mut MarsPhoto,
        picsum: &mut PhotoRecord,
    ) -> Result<i64, StoreError> {
        self.save(&mut [
            (Collection::MarsPhotos, mars as &mut dyn StoredRecord),
            (Collection::PicsumPhotos, picsum as &mut dyn StoredRecord),
        ])
        .await
    }

    /// Most recently saved record of each collection, in the order given.
    ///
    /// The queries run concurrently and the result is only returned once all
    /// of them have resolved. Empty collections and failed reads yield `None`.
    pub async fn load_last(&self, collections: &[Collection]) -> Vec<Option<Value>> {
        join_all(collections.iter().map(|c| self.load_last_one(*c))).await
    }

    async fn load_last_one(&self, collection: Collection) -> Option<Value> {
        match self
            .backend
            .query_last(collection.as_str(), SAVED_AT_FIELD, 1)
            .await
        {
            Ok(mut entries) => entries.pop().map(|(_, value)| value),
            Err(e) => {
                tracing::warn!(
                    collection = collection.as_str(),
                    "Failed to read last saved record: {}",
                    e
                );
                None
            }
        }
    }

    /// Typed join over the two photo collections.
    pub async fn load_last_pair(&self) -> (Option<MarsPhoto>, Option<PhotoRecord>) {
        let mut values = self
            .load_last(&[Collection::MarsPhotos, Collection::PicsumPhotos])
            .await
            .into_iter();
        let mars = decode(Collection::MarsPhotos, values.next().flatten());
        let picsum = decode(Collection::PicsumPhotos, values.next().flatten());
        (mars, picsum)
    }

    /// Integer stored at `key`, or 0 when absent, malformed, or unreadable.
    pub async fn get_count(&self, key: &str) -> u64 {
        match self.backend.get(key).await {
            Ok(Some(value)) => value.as_u64().unwrap_or_else(|| {
                tracing::warn!(key, value = %value, "Stored count is not a non-negative integer");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(key, "Failed to read count: {}", e);
                0
            }
        }
    }

    pub async fn set_count(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.backend.set(key, &Value::from(value)).await
    }
}

fn decode<R: DeserializeOwned>(collection: Collection, value: Option<Value>) -> Option<R> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                collection = collection.as_str(),
                "Failed to decode saved record: {}",
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryDatastore;
    use super::*;

    use serde_json::json;
    use tokio::sync::Notify;

    fn mars(id: &str) -> MarsPhoto {
        MarsPhoto {
            id: id.into(),
            img_src: format!("https://mars.nasa.gov/{}.jpg", id),
            saved_at: None,
        }
    }

    fn picsum(id: &str) -> PhotoRecord {
        PhotoRecord {
            id: id.into(),
            author: "Author".into(),
            width: 640,
            height: 480,
            url: format!("https://unsplash.com/photos/{}", id),
            download_url: format!("https://picsum.photos/id/{}/640/480", id),
            is_blurry: false,
            is_black_and_white: false,
            saved_at: None,
        }
    }

    fn memory_store() -> (Arc<MemoryDatastore>, RemoteStore) {
        let db = Arc::new(MemoryDatastore::new());
        let store = RemoteStore::new(db.clone());
        (db, store)
    }

    /// Every operation fails, as if the network were down.
    struct FailingDatastore;

    #[async_trait::async_trait]
    impl Datastore for FailingDatastore {
        async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::HttpStatus {
                status: 503,
                path: path.into(),
            })
        }

        async fn set(&self, path: &str, _value: &Value) -> Result<(), StoreError> {
            Err(StoreError::HttpStatus {
                status: 503,
                path: path.into(),
            })
        }

        async fn push(&self, path: &str, _value: &Value) -> Result<String, StoreError> {
            Err(StoreError::HttpStatus {
                status: 503,
                path: path.into(),
            })
        }

        async fn query_last(
            &self,
            path: &str,
            _order_by: &str,
            _limit: usize,
        ) -> Result<Vec<(String, Value)>, StoreError> {
            Err(StoreError::HttpStatus {
                status: 503,
                path: path.into(),
            })
        }
    }

    /// Holds queries against one path until the gate is opened.
    struct GatedDatastore {
        inner: MemoryDatastore,
        gated_path: &'static str,
        gate: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl Datastore for GatedDatastore {
        async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(path).await
        }

        async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
            self.inner.set(path, value).await
        }

        async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
            self.inner.push(path, value).await
        }

        async fn query_last(
            &self,
            path: &str,
            order_by: &str,
            limit: usize,
        ) -> Result<Vec<(String, Value)>, StoreError> {
            if path == self.gated_path {
                self.gate.notified().await;
            }
            self.inner.query_last(path, order_by, limit).await
        }
    }

    #[tokio::test]
    async fn test_save_pair_shares_timestamp() {
        let (db, store) = memory_store();
        let mut m = mars("m1");
        let mut p = picsum("p1");

        let saved_at = store.save_pair(&mut m, &mut p).await.unwrap();
        assert_eq!(m.saved_at, Some(saved_at));
        assert_eq!(p.saved_at, Some(saved_at));

        let stored_m = db.get("marsPhotos/m1").await.unwrap().unwrap();
        let stored_p = db.get("picsumPhotos/p1").await.unwrap().unwrap();
        assert_eq!(stored_m["savedAt"], json!(saved_at));
        assert_eq!(stored_p["savedAt"], json!(saved_at));
    }

    #[tokio::test]
    async fn test_save_appends_history() {
        let (db, store) = memory_store();
        let mut m = mars("m1");
        let mut p = picsum("p1");
        store.save_pair(&mut m, &mut p).await.unwrap();
        store.save_pair(&mut m, &mut p).await.unwrap();

        // Records are keyed by id and overwritten; history keeps every save.
        let records = db.get("marsPhotos").await.unwrap().unwrap();
        assert_eq!(records.as_object().unwrap().len(), 1);
        let history = db.get("history/marsPhotos").await.unwrap().unwrap();
        assert_eq!(history.as_object().unwrap().len(), 2);
        let history = db.get("history/picsumPhotos").await.unwrap().unwrap();
        for entry in history.as_object().unwrap().values() {
            assert!(entry["savedAt"].is_i64());
            assert_eq!(entry["id"], "p1");
        }
    }

    #[tokio::test]
    async fn test_history_copy_matches_record_timestamp() {
        let (db, store) = memory_store();
        let mut m = mars("m1");
        let mut p = picsum("p1");
        let saved_at = store.save_pair(&mut m, &mut p).await.unwrap();

        let history = db.get("history/picsumPhotos").await.unwrap().unwrap();
        let entry = history.as_object().unwrap().values().next().unwrap().clone();
        assert_eq!(entry["savedAt"], json!(saved_at));
    }

    #[tokio::test]
    async fn test_save_generic_record_set() {
        let (db, store) = memory_store();
        let mut a = picsum("a");
        let mut b = picsum("b");
        let saved_at = store
            .save(&mut [
                (Collection::PicsumPhotos, &mut a as &mut dyn StoredRecord),
                (Collection::PicsumPhotos, &mut b as &mut dyn StoredRecord),
            ])
            .await
            .unwrap();
        assert_eq!(a.saved_at, b.saved_at);
        assert_eq!(a.saved_at, Some(saved_at));
        assert!(db.get("picsumPhotos/a").await.unwrap().is_some());
        assert!(db.get("picsumPhotos/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_last_pair_returns_newest() {
        let (db, store) = memory_store();
        db.set("marsPhotos/old", &json!({"id": "old", "imgSrc": "o", "savedAt": 100}))
            .await
            .unwrap();
        db.set("marsPhotos/new", &json!({"id": "new", "imgSrc": "n", "savedAt": 200}))
            .await
            .unwrap();
        let mut p = picsum("p1");
        p.saved_at = Some(150);
        db.set("picsumPhotos/p1", &p.to_value().unwrap())
            .await
            .unwrap();

        let (m, p) = store.load_last_pair().await;
        assert_eq!(m.unwrap().id, "new");
        assert_eq!(p.unwrap().id, "p1");
    }

    #[tokio::test]
    async fn test_load_last_pair_after_save_round() {
        let (_db, store) = memory_store();
        let mut m = mars("m1");
        let mut p = picsum("p1");
        p.is_blurry = true;
        store.save_pair(&mut m, &mut p).await.unwrap();

        let (lm, lp) = store.load_last_pair().await;
        assert_eq!(lm, Some(m));
        assert_eq!(lp, Some(p));
    }

    #[tokio::test]
    async fn test_load_last_empty_store() {
        let (_db, store) = memory_store();
        assert_eq!(store.load_last_pair().await, (None, None));
    }

    #[tokio::test]
    async fn test_load_last_one_side_empty() {
        let (db, store) = memory_store();
        db.set("marsPhotos/m", &json!({"id": "m", "imgSrc": "x", "savedAt": 1}))
            .await
            .unwrap();
        let (m, p) = store.load_last_pair().await;
        assert!(m.is_some());
        assert!(p.is_none());
    }

    #[tokio::test]
    async fn test_load_last_waits_for_all_queries() {
        let inner = MemoryDatastore::new();
        inner
            .set("marsPhotos/m", &json!({"id": "m", "imgSrc": "x", "savedAt": 1}))
            .await
            .unwrap();
        let gate = Arc::new(Notify::new());
        let store = RemoteStore::new(Arc::new(GatedDatastore {
            inner,
            gated_path: "picsumPhotos",
            gate: gate.clone(),
        }));

        let handle = tokio::spawn(async move {
            store
                .load_last(&[Collection::MarsPhotos, Collection::PicsumPhotos])
                .await
        });
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        // The Mars query has resolved, but nothing is delivered yet.
        assert!(!handle.is_finished());

        gate.notify_one();
        let values = handle.await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_ref().unwrap()["id"], "m");
        assert!(values[1].is_none());
    }

    #[tokio::test]
    async fn test_undecodable_record_is_not_found() {
        let (db, store) = memory_store();
        db.set("picsumPhotos/bad", &json!({"id": "bad", "savedAt": 5}))
            .await
            .unwrap();
        let (_, p) = store.load_last_pair().await;
        assert!(p.is_none());
    }

    #[tokio::test]
    async fn test_count_defaults_to_zero() {
        let (_db, store) = memory_store();
        assert_eq!(store.get_count(ROLLS_KEY).await, 0);
    }

    #[tokio::test]
    async fn test_set_then_get_count() {
        let (_db, store) = memory_store();
        store.set_count(ROLLS_KEY, 5).await.unwrap();
        assert_eq!(store.get_count(ROLLS_KEY).await, 5);
    }

    #[tokio::test]
    async fn test_malformed_count_is_zero() {
        let (db, store) = memory_store();
        db.set(ROLLS_KEY, &json!("seven")).await.unwrap();
        assert_eq!(store.get_count(ROLLS_KEY).await, 0);
        db.set(ROLLS_KEY, &json!(-3)).await.unwrap();
        assert_eq!(store.get_count(ROLLS_KEY).await, 0);
    }

    #[tokio::test]
    async fn test_read_failures_downgrade_to_defaults() {
        let store = RemoteStore::new(Arc::new(FailingDatastore));
        assert_eq!(store.get_count(ROLLS_KEY).await, 0);
        assert_eq!(store.load_last_pair().await, (None, None));
    }

    #[tokio::test]
    async fn test_write_failures_are_returned() {
        let store = RemoteStore::new(Arc::new(FailingDatastore));
        let mut m = mars("m");
        let mut p = picsum("p");
        let err = store.save_pair(&mut m, &mut p).await.unwrap_err();
        assert!(matches!(err, StoreError::HttpStatus { status: 503, .. }));
        assert!(store.set_count(ROLLS_KEY, 1).await.is_err());
    }

    struct Unencodable;

    impl StoredRecord for Unencodable {
        fn id(&self) -> &str {
            "broken"
        }

        fn stamp(&mut self, _saved_at: i64) {}

        fn to_value(&self) -> serde_json::Result<Value> {
            serde_json::from_str("{not json")
        }
    }

    #[tokio::test]
    async fn test_unencodable_record_aborts_before_any_write() {
        let (db, store) = memory_store();
        let mut m = mars("m1");
        let mut broken = Unencodable;
        let err = store
            .save(&mut [
                (Collection::MarsPhotos, &mut m as &mut dyn StoredRecord),
                (Collection::PicsumPhotos, &mut broken as &mut dyn StoredRecord),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
        assert_eq!(db.get("marsPhotos/m1").await.unwrap(), None);
        assert_eq!(db.get("history/marsPhotos").await.unwrap(), None);
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(Collection::MarsPhotos.as_str(), "marsPhotos");
        assert_eq!(
            Collection::PicsumPhotos.history_path(),
            "history/picsumPhotos"
        );
        assert_eq!(Collection::MarsPhotos.record_path("7"), "marsPhotos/7");
    }
}
