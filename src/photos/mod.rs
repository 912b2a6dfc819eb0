//! Photo entities and the remote photo-list sources they are fetched from.

pub mod error;
pub mod source;
pub mod types;

pub use error::FetchError;
pub use source::{HttpPhotoSource, PhotoSource};
pub use types::{MarsPhoto, PhotoRecord, StoredRecord};

/// Default Mars photo list endpoint.
pub const DEFAULT_MARS_ENDPOINT: &str = "https://android-kotlin-fun-mars-server.appspot.com/photos";

/// Default Picsum photo list endpoint.
pub const DEFAULT_PICSUM_ENDPOINT: &str = "https://picsum.photos/v2/list";
