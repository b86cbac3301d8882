//! Key-value cache behind every pipeline stage.
//!
//! Keys are `/`-separated relative paths. On disk they map onto a directory
//! tree:
//!
//! ```text
//! cache/
//! ├── spider/{season}/{race name}.csv                   # scraped results
//! ├── pitstops/{season}/{season}_{race}.csv             # raw pit stops
//! ├── processed/{season}/pitstops_{season}_{race}.csv   # aggregates
//! ├── drivers_{start}_{end}.json                        # driver mapping
//! └── pitstops_{start}_{end}.csv                        # combined raw pit stops
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::table;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing cache entry: {0}")]
    Missing(String),
}

pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every entry whose key starts with `prefix`, returning how many.
    fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn get_table<T: DeserializeOwned>(
        &self,
        key: &str,
        delimiter: u8,
    ) -> Result<Option<Vec<T>>, StoreError>
    where
        Self: Sized,
    {
        self.get(key)?
            .map(|bytes| table::decode(&bytes, delimiter))
            .transpose()
    }

    fn put_table<T: Serialize>(&self, key: &str, rows: &[T], delimiter: u8) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.put(key, &table::encode(rows, delimiter)?)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.put(key, &serde_json::to_vec_pretty(value)?)
    }
}

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FsStore {
    root_dir: PathBuf,
}

impl FsStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root_dir) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl CacheStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path(key).is_file())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let keys = self.list(prefix)?;
        for key in &keys {
            std::fs::remove_file(self.path(key))?;
        }

        if prefix.ends_with('/') {
            match std::fs::remove_dir_all(self.path(prefix.trim_end_matches('/'))) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }

        Ok(keys.len())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let base = match prefix.rfind('/') {
            Some(pos) => self.path(&prefix[..pos]),
            None => self.root_dir.clone(),
        };

        let mut keys = Vec::new();
        self.collect_keys(&base, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix) && !key.ends_with(".tmp"));
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries().contains_key(key))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &impl CacheStore) {
        assert!(!store.exists("pitstops/2019/2019_1.csv").unwrap());
        assert_eq!(store.get("pitstops/2019/2019_1.csv").unwrap(), None);

        store.put("pitstops/2019/2019_1.csv", b"a").unwrap();
        store.put("pitstops/2019/2019_2.csv", b"b").unwrap();
        store.put("pitstops/2020/2020_1.csv", b"c").unwrap();
        store.put("drivers_2019_2020.json", b"{}").unwrap();

        assert!(store.exists("pitstops/2019/2019_1.csv").unwrap());
        assert_eq!(
            store.get("pitstops/2019/2019_2.csv").unwrap().as_deref(),
            Some(&b"b"[..])
        );
        assert_eq!(
            store.list("pitstops/").unwrap(),
            vec![
                "pitstops/2019/2019_1.csv",
                "pitstops/2019/2019_2.csv",
                "pitstops/2020/2020_1.csv",
            ]
        );

        assert_eq!(store.delete_prefix("pitstops/2019/").unwrap(), 2);
        assert_eq!(store.list("pitstops/").unwrap(), vec!["pitstops/2020/2020_1.csv"]);
        assert!(store.exists("drivers_2019_2020.json").unwrap());
        assert_eq!(store.delete_prefix("pitstops/2019/").unwrap(), 0);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        exercise(&store);
        assert!(!dir.path().join("pitstops/2019").exists());
        assert!(dir.path().join("pitstops/2020/2020_1.csv").is_file());
    }

    #[test]
    fn test_fs_store_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("spider/2021/Dutch Grand Prix.csv", b"old").unwrap();
        store.put("spider/2021/Dutch Grand Prix.csv", b"new").unwrap();
        assert_eq!(
            store.get("spider/2021/Dutch Grand Prix.csv").unwrap().as_deref(),
            Some(&b"new"[..])
        );
        assert_eq!(store.list("spider/").unwrap().len(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let store = MemoryStore::new();
        let value: BTreeMap<String, i32> = [("alonso".to_string(), 14)].into();
        store.put_json("drivers_2014_2014.json", &value).unwrap();
        let back: Option<BTreeMap<String, i32>> = store.get_json("drivers_2014_2014.json").unwrap();
        assert_eq!(back, Some(value));
        assert_eq!(
            store.get_json::<BTreeMap<String, i32>>("missing.json").unwrap(),
            None
        );
    }
}
