use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const VALUES_DIR: &str = "values";
pub const DEFAULT_STORAGE_DIR: &str = "storage";

#[must_use]
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE_NAME)
}

#[must_use]
pub fn values_dir(root: &Path) -> PathBuf {
    root.join(VALUES_DIR)
}

/// Strips everything except ASCII alphanumerics, `.`, `_` and `-`.
///
/// Distinct raw keys can sanitize to the same name; the later write wins.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Relative location (from the storage root) of the value file for `key`.
///
/// Keys that sanitize to nothing, or only to dots, get a random name.
#[must_use]
pub fn value_location(key: &str) -> String {
    let safe_key = sanitize_key(key);
    let stem = if safe_key.chars().all(|c| c == '.') {
        uuid::Uuid::new_v4().to_string()
    } else {
        safe_key
    };

    format!("{VALUES_DIR}/{stem}.json")
}
