//! Local filesystem backend.
//!
//! Objects are written under `base_dir` and served by whatever static file
//! server sits behind `public_base_url`. Writes go through a temp file in
//! the destination directory followed by a no-clobber rename, so readers
//! never observe a partial collage and an existing object is never replaced.

use super::{trim_base, ObjectStorage};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url: String = public_base_url.into();
        Self {
            base_dir: base_dir.into(),
            public_base_url: trim_base(&public_base_url).to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of `path`, refusing anything that leaves `base_dir`.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: 400,
                message: "object path must be relative and stay inside the storage root".into(),
            });
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| StorageError::Io {
                path: parent.clone(),
                source,
            })?;

        let len = bytes.len();
        let object = path.to_string();
        let dest = target.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let io_err = |source: std::io::Error| StorageError::Io {
                path: dest.clone(),
                source,
            };
            let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
            tmp.write_all(&bytes).map_err(io_err)?;
            tmp.as_file().sync_all().map_err(io_err)?;
            tmp.persist_noclobber(&dest).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists { path: object }
                } else {
                    io_err(e.error)
                }
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io {
            path: target.clone(),
            source: std::io::Error::other(e.to_string()),
        })??;

        info!("Wrote {} bytes to {}", len, target.display());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    async fn create_signed_url(&self, _path: &str, _ttl_secs: u64) -> Result<String, StorageError> {
        Err(StorageError::Unsupported {
            backend: "local",
            operation: "create_signed_url",
        })
    }
}
