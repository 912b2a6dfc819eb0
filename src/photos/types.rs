use serde::{Deserialize, Serialize};

/// A photo from the Picsum list API.
///
/// The API spells the download location `download_url`; the datastore keeps
/// the camelCase field names, so both spellings are accepted on input and
/// records are always written back as `downloadUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub author: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
    #[serde(alias = "download_url")]
    pub download_url: String,
    #[serde(default)]
    pub is_blurry: bool,
    #[serde(default)]
    pub is_black_and_white: bool,
    /// Epoch milliseconds; only the store write path sets this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
}

/// A photo from the Mars photo list API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarsPhoto {
    pub id: String,
    #[serde(alias = "img_src")]
    pub img_src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
}

/// A record the remote store can persist under its own id.
///
/// Object-safe so one save call can stamp a heterogeneous set of records.
pub trait StoredRecord: Send + Sync {
    fn id(&self) -> &str;
    fn stamp(&mut self, saved_at: i64);
    fn to_value(&self) -> serde_json::Result<serde_json::Value>;
}

impl StoredRecord for PhotoRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, saved_at: i64) {
        self.saved_at = Some(saved_at);
    }

    fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl StoredRecord for MarsPhoto {
    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, saved_at: i64) {
        self.saved_at = Some(saved_at);
    }

    fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
