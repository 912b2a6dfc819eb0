use std::marker::PhantomData;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::error::FetchError;

/// A remote list of photos of one shape.
///
/// The HTTP implementation lives below; tests substitute in-memory sources.
#[async_trait::async_trait]
pub trait PhotoSource<T>: Send + Sync {
    /// Short label used in logs and rendered summaries.
    fn name(&self) -> &str;

    async fn list(&self) -> Result<Vec<T>, FetchError>;
}

/// Fetches a JSON array of `T` from a fixed endpoint.
pub struct HttpPhotoSource<T> {
    name: String,
    client: Client,
    endpoint: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for HttpPhotoSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPhotoSource")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl<T> HttpPhotoSource<T> {
    pub fn new(name: impl Into<String>, client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            endpoint: endpoint.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T> PhotoSource<T> for HttpPhotoSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self) -> Result<Vec<T>, FetchError> {
        tracing::debug!(source = %self.name, url = %self.endpoint, "Fetching photo list");
        let resp = self.client.get(&self.endpoint).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }
        // Decode separately so malformed payloads surface as `Json`, not `Http`.
        let body = resp.bytes().await?;
        let photos: Vec<T> = serde_json::from_slice(&body)?;
        tracing::debug!(source = %self.name, count = photos.len(), "Photo list received");
        Ok(photos)
    }
}
