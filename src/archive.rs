//! Durable archive of successful responses
//!
//! [`FileArchive`] lays responses out as
//! `<root>/<YYYY-MM-DD>/<userid>/<apikey>/<scope>/<operation>/Request_<YYYYmmdd-HHMMSS>_<args>.xml`,
//! with anonymous calls under `public/public`. Two identical requests within the
//! same second map to the same file; the later one wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveResult};
use crate::key::RequestKey;

/// Sink for raw bytes of successful calls
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn save(&self, key: &RequestKey, xml: &[u8]) -> ArchiveResult<()>;
}

/// Archive that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchive;

#[async_trait]
impl ArchiveStore for NullArchive {
    async fn save(&self, _key: &RequestKey, _xml: &[u8]) -> ArchiveResult<()> {
        Ok(())
    }
}

/// Build the archive selected by `config.enabled`
pub fn from_config(config: &ArchiveConfig) -> Arc<dyn ArchiveStore> {
    if config.enabled {
        Arc::new(FileArchive::new(config))
    } else {
        Arc::new(NullArchive)
    }
}

/// Sets the process umask and restores the previous one when dropped
///
/// The umask is process-wide, so guards are serialized: a second guard blocks
/// until the first one has restored the mask.
pub struct UmaskGuard {
    #[cfg(unix)]
    previous: libc::mode_t,
    _lock: MutexGuard<'static, ()>,
}

static UMASK_LOCK: Mutex<()> = Mutex::new(());

impl UmaskGuard {
    #[cfg(unix)]
    pub fn set(mask: u32) -> Self {
        let lock = UMASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: umask only swaps the process file-creation mask and cannot fail.
        let previous = unsafe { libc::umask(mask as libc::mode_t) };
        Self {
            previous,
            _lock: lock,
        }
    }

    /// Mask that was in effect before this guard
    #[cfg(unix)]
    pub fn previous(&self) -> u32 {
        self.previous as u32
    }

    #[cfg(not(unix))]
    pub fn set(_mask: u32) -> Self {
        Self {
            _lock: UMASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // `_lock` is released after this body runs
        #[cfg(unix)]
        // SAFETY: see `UmaskGuard::set`.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

/// Filesystem archive
#[derive(Debug, Clone)]
pub struct FileArchive {
    basepath: PathBuf,
    delimiter: char,
    file_mode: u32,
    dir_mode: u32,
}

impl FileArchive {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            basepath: config.directory.clone(),
            delimiter: config.delimiter(),
            file_mode: config.file_mode,
            dir_mode: config.dir_mode,
        }
    }

    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    /// Absolute file path for `key` at time `now`
    pub fn filename(&self, key: &RequestKey, now: DateTime<Utc>) -> PathBuf {
        self.basepath.join(key.archive_path(now, self.delimiter))
    }

    /// Write `xml` for `key` as archived at `now`, returning the file path
    pub fn save_at(&self, key: &RequestKey, xml: &[u8], now: DateTime<Utc>) -> ArchiveResult<PathBuf> {
        let path = self.filename(key, now);

        if let Some(dir) = path.parent()
            && !dir.exists()
        {
            self.create_dir(dir)?;
        }

        fs::write(&path, xml).map_err(|source| ArchiveError::Write {
            path: path.display().to_string(),
            source,
        })?;
        self.set_file_mode(&path)?;

        Ok(path)
    }

    fn create_dir(&self, dir: &Path) -> ArchiveResult<()> {
        let _umask = UmaskGuard::set(0);

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode);
        }

        builder.create(dir).map_err(|source| ArchiveError::CreateDir {
            path: dir.display().to_string(),
            source,
        })
    }

    #[cfg(unix)]
    fn set_file_mode(&self, path: &Path) -> ArchiveResult<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(self.file_mode)).map_err(|source| {
            ArchiveError::Write {
                path: path.display().to_string(),
                source,
            }
        })
    }

    #[cfg(not(unix))]
    fn set_file_mode(&self, _path: &Path) -> ArchiveResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for FileArchive {
    async fn save(&self, key: &RequestKey, xml: &[u8]) -> ArchiveResult<()> {
        let archive = self.clone();
        let key = key.clone();
        let xml = xml.to_vec();

        let path = tokio::task::spawn_blocking(move || archive.save_at(&key, &xml, Utc::now()))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))??;

        tracing::debug!(path = %path.display(), "archived response");
        Ok(())
    }
}
