//! Host directory volume.
//!
//! [`HostVolume`] stands in for the removable card when the logger runs on a
//! desktop: "mounting" creates the root directory, files live directly inside
//! it, and the reported capacity is a configured figure so the status screen
//! shows meaningful usage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;
use crate::hardware::capabilities::{FileHandle, OpenMode, PersistentFile, VolumeSpace};

/// [`PersistentFile`] backed by a host directory.
pub struct HostVolume {
    root: PathBuf,
    capacity_bytes: u64,
    mounted: bool,
    files: HashMap<u32, File>,
    next_handle: u32,
}

impl HostVolume {
    /// Volume rooted at `root`, reporting `capacity_bytes` of total space.
    pub fn new(root: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        Self {
            root: root.into(),
            capacity_bytes,
            mounted: false,
            files: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Directory holding the volume's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_mounted(&self) -> Result<(), StorageError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }

    fn file_mut(&mut self, handle: FileHandle) -> Result<&mut File, StorageError> {
        self.files.get_mut(&handle.0).ok_or(StorageError::InvalidHandle)
    }

    async fn used_bytes(&self) -> Result<u64, StorageError> {
        let mut used = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                used += metadata.len();
            }
        }
        Ok(used)
    }
}

#[async_trait]
impl PersistentFile for HostVolume {
    async fn mount(&mut self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        self.mounted = true;
        debug!(root = %self.root.display(), "host volume mounted");
        Ok(())
    }

    async fn open(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        self.ensure_mounted()?;

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        match mode {
            OpenMode::ReadWriteCreateAlways => options.truncate(true),
            OpenMode::ReadWriteAppend => options.append(true),
        };
        let file = options.open(self.root.join(name)).await?;

        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.files.insert(handle, file);
        Ok(FileHandle(handle))
    }

    async fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<usize, StorageError> {
        let file = self.file_mut(handle)?;
        // Flushed so `size` sees every accepted byte.
        let result = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(bytes.len()),
            Err(e) if e.kind() == std::io::ErrorKind::StorageFull => Err(StorageError::DiskFull),
            Err(e) => Err(e.into()),
        }
    }

    async fn sync(&mut self, handle: FileHandle) -> Result<(), StorageError> {
        let file = self.file_mut(handle)?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn close(&mut self, handle: FileHandle) -> Result<(), StorageError> {
        let mut file = self
            .files
            .remove(&handle.0)
            .ok_or(StorageError::InvalidHandle)?;
        if let Err(e) = file.flush().await {
            // Keep the handle so the caller's retry can try again.
            self.files.insert(handle.0, file);
            return Err(e.into());
        }
        Ok(())
    }

    async fn size(&self, handle: FileHandle) -> u64 {
        match self.files.get(&handle.0) {
            Some(file) => file.metadata().await.map_or(0, |m| m.len()),
            None => 0,
        }
    }

    async fn free_space(&self) -> Result<VolumeSpace, StorageError> {
        self.ensure_mounted()?;
        let used = self.used_bytes().await?;
        Ok(VolumeSpace {
            total_bytes: self.capacity_bytes,
            free_bytes: self.capacity_bytes.saturating_sub(used),
        })
    }

    async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        self.ensure_mounted()?;
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
