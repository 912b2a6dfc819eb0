//! Path-addressed JSON datastore seam and its Firebase Realtime Database
//! REST implementation.

use std::cmp::Ordering;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

use super::error::StoreError;

/// Minimal async key-value interface the remote store is written against.
///
/// Paths are slash-separated (`history/marsPhotos`). The concrete Firebase
/// client lives below; tests use the in-memory implementation.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    /// Read the value at `path`; `None` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite the value at `path`.
    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Append `value` under a fresh, monotonically increasing child key of
    /// `path` and return that key.
    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError>;

    /// Children of `path` ordered by their `order_by` field, keeping the last
    /// `limit` entries (oldest first).
    async fn query_last(
        &self,
        path: &str,
        order_by: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError>;
}

/// Firebase Realtime Database over its REST API.
pub struct FirebaseDatastore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl std::fmt::Debug for FirebaseDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseDatastore")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl FirebaseDatastore {
    pub fn new(client: Client, base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Value, StoreError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait::async_trait]
impl Datastore for FirebaseDatastore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let value = self.send(self.request(Method::GET, path), path).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.send(self.request(Method::PUT, path).json(value), path)
            .await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let resp = self
            .send(self.request(Method::POST, path).json(value), path)
            .await?;
        resp.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::unexpected(path, "push response has no \"name\""))
    }

    async fn query_last(
        &self,
        path: &str,
        order_by: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        // Firebase expects the child name as a quoted JSON string.
        let order_by_param = Value::String(order_by.to_string()).to_string();
        let limit_param = limit.to_string();
        let builder = self.request(Method::GET, path).query(&[
            ("orderBy", order_by_param.as_str()),
            ("limitToLast", limit_param.as_str()),
        ]);
        let value = match self.send(builder, path).await {
            Ok(value) => value,
            // Rules without `.indexOn` for the child reject the ordered query.
            Err(StoreError::HttpStatus { status: 400, .. }) => {
                tracing::debug!(path, order_by, "No index for ordered query, sorting locally");
                self.send(self.request(Method::GET, path), path).await?
            }
            Err(e) => return Err(e),
        };
        let entries = match value {
            Value::Null => Vec::new(),
            Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(StoreError::unexpected(
                    path,
                    format!("expected an object of children, got {}", other),
                ))
            }
        };
        // JSON objects carry no order, so the ordering is applied here either way.
        Ok(last_by_child(entries, order_by, limit))
    }
}

/// Order `entries` the way Firebase orders by a child: missing values first,
/// then numbers ascending, ties broken by key. Keeps the last `limit`.
pub(crate) fn last_by_child(
    mut entries: Vec<(String, Value)>,
    order_by: &str,
    limit: usize,
) -> Vec<(String, Value)> {
    entries.sort_by(|(ka, va), (kb, vb)| {
        let a = va.get(order_by).and_then(Value::as_f64);
        let b = vb.get(order_by).and_then(Value::as_f64);
        let by_child = match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        };
        by_child.then_with(|| ka.cmp(kb))
    });
    let skip = entries.len().saturating_sub(limit);
    entries.split_off(skip)
}
