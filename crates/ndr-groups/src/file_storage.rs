use crate::{Result, StorageAdapter};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// A `StorageAdapter` backed by one file per key under a base directory.
/// Intended for local tooling and tests, not for production relay-backed
/// deployments, which will typically bring their own adapter.
pub struct FileStorageAdapter {
    base_path: PathBuf,
}

impl FileStorageAdapter {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .map_err(|e| crate::Error::Storage(format!("failed to create directory: {e}")))?;
        Ok(Self { base_path })
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        let sanitized = key.replace(['/', '\\', ':'], "_");
        self.base_path.join(format!("{sanitized}.json"))
    }
}

impl StorageAdapter for FileStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_to_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::Error::Storage(format!("failed to read file: {e}"))),
        }
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| crate::Error::Storage(format!("failed to create parent dir: {e}")))?;
        }
        fs::write(&path, value)
            .map_err(|e| crate::Error::Storage(format!("failed to write file: {e}")))
    }

    fn del(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_to_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::Error::Storage(format!("failed to delete file: {e}"))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| crate::Error::Storage(format!("failed to read directory: {e}")))?;

        for entry in entries {
            let entry = entry
                .map_err(|e| crate::Error::Storage(format!("failed to read dir entry: {e}")))?;
            let file_name = entry.file_name();
            let file_name_str = file_name.to_string_lossy();
            let Some(key) = file_name_str.strip_suffix(".json") else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }
}

/// A `FileStorageAdapter` that batches writes and flushes them on a timer,
/// so a burst of chain-key updates costs one `fsync`-worthy write instead
/// of one per message.
pub struct DebouncedFileStorage {
    adapter: FileStorageAdapter,
    pending_writes: Mutex<HashMap<String, String>>,
    last_flush: Mutex<std::time::Instant>,
    flush_interval: std::time::Duration,
}

impl DebouncedFileStorage {
    pub fn new(base_path: PathBuf, flush_interval_ms: u64) -> Result<Self> {
        Ok(Self {
            adapter: FileStorageAdapter::new(base_path)?,
            pending_writes: Mutex::new(HashMap::new()),
            last_flush: Mutex::new(std::time::Instant::now()),
            flush_interval: std::time::Duration::from_millis(flush_interval_ms),
        })
    }

    pub fn flush(&self) -> Result<()> {
        let mut pending = self.pending_writes.lock().unwrap();
        for (key, value) in pending.drain() {
            self.adapter.put(&key, value)?;
        }
        *self.last_flush.lock().unwrap() = std::time::Instant::now();
        Ok(())
    }

    fn maybe_flush(&self) -> Result<()> {
        let last = *self.last_flush.lock().unwrap();
        let pending_count = self.pending_writes.lock().unwrap().len();
        if last.elapsed() >= self.flush_interval && pending_count > 0 {
            self.flush()?;
        }
        Ok(())
    }
}

impl StorageAdapter for DebouncedFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.pending_writes.lock().unwrap().get(key) {
            return Ok(Some(value.clone()));
        }
        self.adapter.get(key)
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        self.pending_writes
            .lock()
            .unwrap()
            .insert(key.to_string(), value);
        self.maybe_flush()
    }

    fn del(&self, key: &str) -> Result<()> {
        self.pending_writes.lock().unwrap().remove(key);
        self.adapter.del(key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = self.adapter.list(prefix)?;
        let pending = self.pending_writes.lock().unwrap();
        for key in pending.keys() {
            if key.starts_with(prefix) && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }
}
