//! File-backed stores
//!
//! One JSON document per namespace under a root directory. Writes are
//! buffered in memory and committed by `flush`, which replaces the file
//! atomically through a temporary file in the same directory.

use super::mapper::{from_records, to_records, StoredRecord};
use crate::contract::{
    KeyValueStore, ProtectedStore, SettingValue, SettingsMap, StoreError, StoreFactory,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn io_err(operation: &'static str) -> impl FnOnce(std::io::Error) -> StoreError {
    move |source| StoreError::Io { operation, source }
}

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(T::default()),
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(io_err("read")(e)),
    }
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err("create_dir"))?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err("create_temp"))?;
    tmp.write_all(&bytes).map_err(io_err("write"))?;
    tmp.as_file().sync_all().map_err(io_err("sync"))?;
    tmp.persist(path).map_err(|e| io_err("persist")(e.error))?;
    Ok(())
}

/// JSON file key-value store
pub struct FileStore {
    path: PathBuf,
    data: RwLock<SettingsMap>,
    dirty: AtomicBool,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store, loading existing content from `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records: BTreeMap<String, StoredRecord> = read_json(&path)?;
        Ok(Self {
            path,
            data: RwLock::new(from_records(records)),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_pending_writes(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<SettingValue>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError> {
        self.data.write().insert(key.to_string(), value);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.data.write().remove(key).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.data.write().clear();
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn get_all(&self) -> Result<SettingsMap, StoreError> {
        Ok(self.data.read().clone())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let records = to_records(&self.data.read());
        if let Err(e) = write_json_atomic(&self.path, &records) {
            // Keep the pending flag so a later flush retries
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        tracing::debug!(path = %self.path.display(), "Settings file written");
        Ok(())
    }

    fn discard_pending(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let records: BTreeMap<String, StoredRecord> = read_json(&self.path)?;
        *self.data.write() = from_records(records);
        if self.dirty.swap(false, Ordering::AcqRel) {
            tracing::debug!(path = %self.path.display(), "Discarded unsaved settings");
        }
        Ok(())
    }
}

/// Opens one [`FileStore`] per namespace under a root directory
pub struct FileStoreFactory {
    root: PathBuf,
    opened: DashMap<String, Arc<FileStore>>,
}

impl FileStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            opened: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StoreFactory for FileStoreFactory {
    fn open(&self, namespace: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        if let Some(store) = self.opened.get(namespace) {
            return Ok(store.clone());
        }
        let path = self.root.join(format!("{namespace}.json"));
        let store = Arc::new(FileStore::open(path)?);
        let store = self
            .opened
            .entry(namespace.to_string())
            .or_insert(store)
            .clone();
        Ok(store)
    }
}

/// File-backed protected store
///
/// Values are written on every mutation to a file readable only by the
/// owner. No encryption is applied here.
pub struct FileProtectedStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileProtectedStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data: BTreeMap<String, String> = read_json(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StoreError> {
        write_json_atomic(&self.path, data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(io_err("chmod"))?;
        }
        Ok(())
    }
}

impl ProtectedStore for FileProtectedStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        if data.remove(key).is_some() {
            self.persist(&data)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.clear();
        self.persist(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_durable_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");

        let store = FileStore::open(&path).unwrap();
        store.set("font_size", SettingValue::Int(16)).unwrap();
        store.set("font_family", SettingValue::from("Fira Code")).unwrap();
        assert!(store.has_pending_writes());
        assert!(!path.exists());

        store.flush().unwrap();
        assert!(!store.has_pending_writes());

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("font_size").unwrap(), Some(SettingValue::Int(16)));
        assert_eq!(
            reopened.get("font_family").unwrap(),
            Some(SettingValue::from("Fira Code"))
        );
    }

    #[test]
    fn test_discard_pending_restores_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");

        let store = FileStore::open(&path).unwrap();
        store.set("font_size", SettingValue::Int(16)).unwrap();
        store.flush().unwrap();

        store.set("font_size", SettingValue::Int(20)).unwrap();
        store.set("tab_size", SettingValue::Int(2)).unwrap();
        store.discard_pending().unwrap();

        assert!(!store.has_pending_writes());
        assert_eq!(store.get("font_size").unwrap(), Some(SettingValue::Int(16)));
        assert_eq!(store.get("tab_size").unwrap(), None);

        // Nothing left to write
        store.flush().unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_factory_places_namespaces_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileStoreFactory::new(dir.path());
        let store = factory.open("git").unwrap();
        store.set("user_name", SettingValue::from("octo")).unwrap();
        store.flush().unwrap();

        assert!(dir.path().join("git.json").exists());
    }

    #[test]
    fn test_protected_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protected.json");
        let store = FileProtectedStore::open(&path).unwrap();
        store.put("git/auth_token", "abc123").unwrap();

        let reopened = FileProtectedStore::open(&path).unwrap();
        assert_eq!(reopened.get("git/auth_token").unwrap().as_deref(), Some("abc123"));
    }
}
