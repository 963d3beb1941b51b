//! Article image cache.
//!
//! Images are never interpreted here. The only operation the controllers need
//! is `clear`, called when the search screen is torn down.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Cache of downloaded article images
pub trait ImageCache: Send + Sync {
    /// Drop every cached entry
    fn clear(&self) -> Result<()>;
}

/// Image cache kept in a directory on disk
pub struct DiskImageCache {
    dir: PathBuf,
}

impl DiskImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `images/` under the platform cache directory
    pub fn default_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "newsreader", "Newsreader")
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
        Ok(dirs.cache_dir().join("images"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total size of the cached files in bytes, nested entries included
    pub fn size_on_disk(&self) -> Result<u64> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut total = 0;
        for entry in WalkDir::new(&self.dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

impl ImageCache for DiskImageCache {
    fn clear(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }

        let mut removed = 0usize;
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read cache directory {:?}", self.dir))?
        {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }

        tracing::debug!("Cleared {} entries from image cache {:?}", removed, self.dir);
        Ok(())
    }
}
