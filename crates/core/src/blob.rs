use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::new_id;

/// Object storage for photos. Returns a retrievable reference for each upload.
pub trait BlobStore: Send + Sync {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String>;
}

/// Stores uploads as files under a directory and hands out `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target_path(&self, file_name: &str) -> PathBuf {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        let name = match extension {
            Some(ext) => format!("{}.{}", new_id(), ext),
            None => new_id(),
        };
        self.root.join(name)
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create photo directory at {}", self.root.display())
        })?;
        let target = self.target_path(file_name);
        fs::write(&target, bytes)
            .with_context(|| format!("Failed to store photo at {}", target.display()))?;
        let absolute = target.canonicalize().unwrap_or(target);
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn upload_writes_file_and_returns_url() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("photos"));

        let url = store.upload("Leak.JPG", b"jpeg-bytes").unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpg"));

        let path = url.trim_start_matches("file://");
        assert_eq!(std::fs::read(path).unwrap(), b"jpeg-bytes");
    }

    #[test]
    fn uploads_never_collide() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        let first = store.upload("photo.png", b"a").unwrap();
        let second = store.upload("photo.png", b"b").unwrap();
        assert_ne!(first, second);
    }
}
