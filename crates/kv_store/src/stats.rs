use std::path::PathBuf;

/// Disk usage snapshot returned by `KeyValueStore::size_stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Bytes across all live value files plus the manifest file.
    pub total_bytes: u64,
    pub file_count: usize,
    pub key_count: usize,
    /// Stale manifest entries dropped since the store was opened.
    pub pruned_entries: usize,
    pub root: PathBuf,
}

impl StorageStats {
    #[must_use]
    pub fn total_size_human(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }

    format!("{value:.1} TB")
}
