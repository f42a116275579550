use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::KvStoreError;
use crate::paths::{manifest_path, value_location, values_dir, MANIFEST_FILE_NAME};
use crate::schema::{EntryInfo, Manifest, ManifestRecord, ValueFile, ValueType};
use crate::stats::StorageStats;

/// Directory-backed key-value store: one JSON file per key plus a manifest.
///
/// The manifest is the source of truth for which keys exist. Entries whose
/// value file has disappeared are pruned the next time they are read.
/// Only one process may use a storage directory at a time.
#[derive(Debug)]
pub struct KeyValueStore {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    pruned_entries: usize,
}

impl KeyValueStore {
    /// Opens (creating if needed) the store rooted at `root`.
    ///
    /// A manifest that cannot be read or parsed is treated as empty.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, KvStoreError> {
        let root = root.as_ref().to_path_buf();
        let values = values_dir(&root);
        fs::create_dir_all(&values)
            .map_err(|source| KvStoreError::io("creating storage directory", &values, source))?;

        let manifest_path = manifest_path(&root);
        let manifest = load_manifest(&manifest_path);
        tracing::debug!(
            root = %root.display(),
            keys = manifest.len(),
            "opened key-value store"
        );

        Ok(Self {
            root,
            manifest_path,
            manifest,
            pruned_entries: 0,
        })
    }

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// The new value is staged next to its final location, the manifest is
    /// saved, and only then is the staged file renamed into place. A failure
    /// at any step leaves the previous value and manifest record readable.
    pub fn store<T>(&mut self, key: &str, value: &T) -> Result<(), KvStoreError>
    where
        T: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(value).map_err(|source| KvStoreError::serialize(key, source))?;
        let stored_at = now_rfc3339()?;
        let location = match self.manifest.get(key) {
            Some(record) => record.location.clone(),
            None => value_location(key),
        };
        let value_type = ValueType::of(&value);

        let file = ValueFile {
            key: key.to_string(),
            value,
            stored_at: stored_at.clone(),
            location: location.clone(),
        };
        let path = self.root.join(&location);
        let staged = staged_path(&path);
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|source| KvStoreError::serialize(key, source))?;
        fs::write(&staged, contents)
            .map_err(|source| KvStoreError::io("writing value file", &staged, source))?;

        let previous = self.manifest.insert(
            key.to_string(),
            ManifestRecord {
                location,
                stored_at,
                value_type,
            },
        );

        if let Err(error) = self.save_manifest() {
            self.restore_record(key, previous);
            discard_staged(&staged);
            return Err(error);
        }

        if let Err(source) = fs::rename(&staged, &path) {
            self.restore_record(key, previous);
            discard_staged(&staged);
            if let Err(error) = self.save_manifest() {
                tracing::warn!(key = %key, %error, "failed to restore manifest after value write");
            }
            return Err(KvStoreError::io("committing value file", &path, source));
        }

        Ok(())
    }

    /// Reads the raw JSON value stored under `key`.
    pub fn retrieve_value(&mut self, key: &str) -> Result<Option<Value>, KvStoreError> {
        let Some(record) = self.manifest.get(key) else {
            return Ok(None);
        };

        let path = self.root.join(&record.location);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                self.prune(vec![key.to_string()])?;
                return Ok(None);
            }
            Err(source) => return Err(KvStoreError::io("reading value file", &path, source)),
        };

        let file: ValueFile = serde_json::from_str(&contents)
            .map_err(|source| KvStoreError::value_parse(&path, source))?;
        Ok(Some(file.value))
    }

    /// Reads the value stored under `key` as `T`.
    pub fn retrieve<T>(&mut self, key: &str) -> Result<Option<T>, KvStoreError>
    where
        T: DeserializeOwned,
    {
        match self.retrieve_value(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| KvStoreError::deserialize(key, source)),
            None => Ok(None),
        }
    }

    /// Removes `key`. Unknown keys are a no-op.
    pub fn delete(&mut self, key: &str) -> Result<(), KvStoreError> {
        let Some(record) = self.manifest.get(key) else {
            return Ok(());
        };

        let path = self.root.join(&record.location);
        remove_value_file(&path)?;

        self.manifest.remove(key);
        self.save_manifest()
    }

    /// True when `key` is in the manifest and its value file has not been
    /// observed missing.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.manifest
            .get(key)
            .is_some_and(|record| !is_missing(&self.root.join(&record.location)))
    }

    /// Lists live keys in sorted order, pruning entries whose file is gone.
    pub fn list_keys(&mut self) -> Result<Vec<String>, KvStoreError> {
        let stale = self
            .manifest
            .iter()
            .filter(|(_, record)| is_missing(&self.root.join(&record.location)))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        if !stale.is_empty() {
            self.prune(stale)?;
        }

        Ok(self.manifest.keys().cloned().collect())
    }

    pub fn size_stats(&mut self) -> Result<StorageStats, KvStoreError> {
        let keys = self.list_keys()?;

        let mut total_bytes = 0u64;
        let mut file_count = 0usize;
        for key in &keys {
            let Some(record) = self.manifest.get(key) else {
                continue;
            };

            if let Ok(metadata) = fs::metadata(self.root.join(&record.location)) {
                total_bytes += metadata.len();
                file_count += 1;
            }
        }

        if let Ok(metadata) = fs::metadata(&self.manifest_path) {
            total_bytes += metadata.len();
        }

        Ok(StorageStats {
            total_bytes,
            file_count,
            key_count: self.manifest.len(),
            pruned_entries: self.pruned_entries,
            root: self.root.clone(),
        })
    }

    #[must_use]
    pub fn info(&self, key: &str) -> Option<EntryInfo> {
        let record = self.manifest.get(key)?;
        Some(EntryInfo {
            key: key.to_string(),
            location: record.location.clone(),
            stored_at: record.stored_at.clone(),
            value_type: record.value_type,
            exists: self.exists(key),
        })
    }

    /// Removes every stored entry and empties the manifest.
    pub fn clear(&mut self) -> Result<(), KvStoreError> {
        for record in self.manifest.values() {
            remove_value_file(&self.root.join(&record.location))?;
        }

        self.manifest.clear();
        self.save_manifest()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prune(&mut self, keys: Vec<String>) -> Result<(), KvStoreError> {
        for key in keys {
            if let Some(record) = self.manifest.remove(&key) {
                self.pruned_entries += 1;
                tracing::warn!(
                    key = %key,
                    location = %record.location,
                    "pruning manifest entry whose value file is missing"
                );
            }
        }

        self.save_manifest()
    }

    fn restore_record(&mut self, key: &str, previous: Option<ManifestRecord>) {
        match previous {
            Some(record) => {
                self.manifest.insert(key.to_string(), record);
            }
            None => {
                self.manifest.remove(key);
            }
        }
    }

    fn save_manifest(&self) -> Result<(), KvStoreError> {
        let contents = serde_json::to_string_pretty(&self.manifest)
            .map_err(|source| KvStoreError::serialize(MANIFEST_FILE_NAME, source))?;
        fs::write(&self.manifest_path, contents)
            .map_err(|source| KvStoreError::io("writing manifest", &self.manifest_path, source))
    }
}

fn load_manifest(path: &Path) -> Manifest {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Manifest::new(),
        Err(source) => {
            tracing::warn!(
                path = %path.display(),
                error = %source,
                "failed to read manifest; starting empty"
            );
            return Manifest::new();
        }
    };

    match serde_json::from_str::<Manifest>(&contents) {
        Ok(manifest) => manifest,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "corrupted manifest; starting empty"
            );
            Manifest::new()
        }
    }
}

/// Only a confirmed `NotFound` counts as missing; other metadata errors
/// leave the entry alone.
fn is_missing(path: &Path) -> bool {
    matches!(fs::metadata(path), Err(source) if source.kind() == io::ErrorKind::NotFound)
}

fn staged_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_os_string();
    staged.push(".tmp");
    PathBuf::from(staged)
}

fn discard_staged(path: &Path) {
    if let Err(source) = fs::remove_file(path) {
        if source.kind() != io::ErrorKind::NotFound {
            tracing::warn!(
                path = %path.display(),
                error = %source,
                "failed to remove staged value file"
            );
        }
    }
}

fn remove_value_file(path: &Path) -> Result<(), KvStoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(KvStoreError::io("removing value file", path, source)),
    }
}

fn now_rfc3339() -> Result<String, KvStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(KvStoreError::ClockFormat)
}
