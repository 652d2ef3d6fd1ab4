//! Local-disk artifact writes

use crashsim_model::ArtifactKey;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Writes artifacts under a root directory, mirroring the object key layout
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path `key` maps to; `.` and `..` segments are dropped
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        key.segments()
            .filter(|s| {
                !matches!(
                    Path::new(s).components().next(),
                    Some(Component::CurDir | Component::ParentDir)
                )
            })
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Write `bytes` atomically and return the absolute path written
    ///
    /// # Errors
    /// Any I/O error creating the directory or writing the file.
    pub async fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = absolute(&self.path_for(key))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(path)
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}
