mod error;
mod paths;
mod schema;
mod stats;
mod store;

pub use error::KvStoreError;
pub use paths::{
    manifest_path, sanitize_key, value_location, values_dir, DEFAULT_STORAGE_DIR,
    MANIFEST_FILE_NAME, VALUES_DIR,
};
pub use schema::{EntryInfo, ManifestRecord, ValueFile, ValueType};
pub use stats::{format_bytes, StorageStats};
pub use store::KeyValueStore;
