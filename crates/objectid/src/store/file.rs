use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CounterKey, CounterStore, Error, Provisioned, Result};

/// Width of a persisted counter record.
const RECORD_LEN: usize = core::mem::size_of::<u64>();

/// A [`CounterStore`] keeping one small file per counter in a data
/// directory.
///
/// Each record is named after its [`CounterKey::file_name`] and holds exactly
/// eight bytes: the counter as a big-endian `u64`. Updates are written to a
/// sibling temporary file, flushed, and renamed over the record, so a crash
/// leaves either the old or the new value on disk and never a torn one.
///
/// The store does not lock records itself. Callers serialize access per key,
/// which [`crate::BlockAllocator`] does with its per-type locks.
#[derive(Debug)]
pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if `dir` exists but is not a directory, or
    /// if it cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {
                #[cfg(feature = "tracing")]
                tracing::info!(dir = %dir.display(), "using data directory");
            }
            Ok(_) => {
                return Err(Error::storage(&dir, "data directory is not a directory"));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                #[cfg(feature = "tracing")]
                tracing::warn!(dir = %dir.display(), "creating nonexistent data directory");
                fs::create_dir_all(&dir)
                    .map_err(|e| Error::io(&dir, "creating data directory", e))?;
            }
            Err(e) => return Err(Error::io(&dir, "inspecting data directory", e)),
        }
        Ok(Self { dir })
    }

    /// The directory holding the counter records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the record for `key`.
    pub fn record_path(&self, key: &CounterKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn read_record(path: &Path) -> Result<u64> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, "reading counter", e))?;
        let record: [u8; RECORD_LEN] = bytes.as_slice().try_into().map_err(|_| {
            Error::storage(
                path,
                format!(
                    "counter record must be {RECORD_LEN} bytes but is {}",
                    bytes.len()
                ),
            )
        })?;
        Ok(u64::from_be_bytes(record))
    }

    fn write_record(&self, path: &Path, value: u64) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)
                .map_err(|e| Error::io(&tmp, "opening counter scratch file", e))?;
            file.write_all(&value.to_be_bytes())
                .map_err(|e| Error::io(&tmp, "writing counter", e))?;
            file.sync_all()
                .map_err(|e| Error::io(&tmp, "syncing counter", e))?;
        }

        fs::rename(&tmp, path).map_err(|e| Error::io(path, "replacing counter", e))?;
        self.sync_dir()
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> Result<()> {
        File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| Error::io(&self.dir, "syncing data directory", e))
    }

    // Directory handles cannot be synced on every platform; the rename is
    // already durable there once it returns.
    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<()> {
        Ok(())
    }
}

impl CounterStore for FileCounterStore {
    fn exists(&self, key: &CounterKey) -> Result<bool> {
        let path = self.record_path(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Err(Error::storage(&path, "counter record is not a file")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&path, "inspecting counter", e)),
        }
    }

    fn read(&self, key: &CounterKey) -> Result<u64> {
        Self::read_record(&self.record_path(key))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(type_name = %key.type_name)))]
    fn provision(&self, key: &CounterKey) -> Result<Provisioned> {
        if self.exists(key)? {
            return self.read(key).map(Provisioned::Existing);
        }
        let path = self.record_path(key);
        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), "creating counter record at 0");
        self.write_record(&path, 0)?;
        Ok(Provisioned::Created)
    }

    fn validated_write(&self, key: &CounterKey, expected: u64, new: u64) -> Result<()> {
        let path = self.record_path(key);
        if new < expected {
            return Err(Error::storage(
                &path,
                format!("counter may not move back from {expected} to {new}"),
            ));
        }
        let found = Self::read_record(&path)?;
        if found != expected {
            return Err(Error::Consistency {
                type_name: key.type_name.clone(),
                expected,
                found,
            });
        }
        self.write_record(&path, new)
    }
}
