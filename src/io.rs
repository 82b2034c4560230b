use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::{breaks, proceeds, Error, Payload};

/// Ceiling of a single key/value pair, in bytes.
pub const DEFAULT_QUOTA: usize = 4096;

/// Key/value persistence for string values.
///
/// `put` is last-write-wins and only atomic per key. `get` reports a missing
/// key as `Ok(None)`; an `Err` means the medium itself failed.
pub trait Store: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Payload<()>;
    fn get(&self, key: &str) -> Payload<Option<String>>;
    fn delete(&self, key: &str) -> Payload<()>;
}

/// Rejects a pair that would not fit under `limit`.
pub fn ensure_fits(key: &str, value: &str, limit: usize) -> Payload<()> {
    let size = key.len() + value.len();
    if size > limit {
        log::warn!(
            "refusing to store `{}`: {} bytes exceeds quota of {}",
            key,
            size,
            limit
        );
        return breaks(Error::StoreQuotaExceeded {
            key: key.to_string(),
            size,
            limit,
        });
    }
    proceeds(())
}

pub struct MemoryStore {
    quota: usize,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(quota: usize) -> Self {
        Self {
            quota,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> Payload<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|_| Error::InternalError {
            kind: "LockPoisoned",
            message: "memory store mutex was poisoned".to_string(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA)
    }
}

impl Store for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Payload<()> {
        ensure_fits(key, value, self.quota)?;
        self.entries()?.insert(key.to_string(), value.to_string());
        proceeds(())
    }

    fn get(&self, key: &str) -> Payload<Option<String>> {
        proceeds(self.entries()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Payload<()> {
        self.entries()?.remove(key);
        proceeds(())
    }
}

/// One file per key under a data directory.
pub struct FileStore {
    root: PathBuf,
    quota: usize,
}

impl FileStore {
    pub fn open<P: Into<PathBuf>>(root: P, quota: usize) -> Payload<Self> {
        let root = root.into();
        prepare_io(&root)?;
        log::debug!("file store opened at {}", root.display());
        proceeds(Self { root, quota })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.dat", hex::encode(key)))
    }
}

impl Store for FileStore {
    fn put(&self, key: &str, value: &str) -> Payload<()> {
        ensure_fits(key, value, self.quota)?;
        write_io_file(self.path_for(key), value)?;
        proceeds(())
    }

    fn get(&self, key: &str) -> Payload<Option<String>> {
        proceeds(read_io_file(self.path_for(key))?)
    }

    fn delete(&self, key: &str) -> Payload<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => proceeds(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => proceeds(()),
            Err(err) => breaks(Error::from(err)),
        }
    }
}

pub fn prepare_io(root: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("creating data directory {}", root.display()))
}

pub fn write_io_file(path: PathBuf, contents: &str) -> anyhow::Result<()> {
    let staging = path.with_extension("tmp");
    fs::write(&staging, contents)
        .with_context(|| format!("writing {}", staging.display()))?;
    fs::rename(&staging, &path).with_context(|| format!("replacing {}", path.display()))
}

pub fn read_io_file(path: PathBuf) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::from(err).context(format!("reading {}", path.display()))),
    }
}
