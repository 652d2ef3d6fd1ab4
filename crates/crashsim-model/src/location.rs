//! Where a persisted artifact lives

use crate::ids::ArtifactKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Backend that accepted the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    RemoteObjectStore,
    LocalDisk,
}

impl StorageBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteObjectStore => "remote-object-store",
            Self::LocalDisk => "local-disk",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of persisting one artifact
///
/// Exactly one location exists per run. `public_url` is only present for
/// the remote backend and `path` only for the local one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    pub backend: StorageBackend,
    pub key: ArtifactKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl ArtifactLocation {
    /// Location in the remote object store
    #[must_use]
    pub fn remote(key: ArtifactKey, public_url: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::RemoteObjectStore,
            key,
            path: None,
            public_url: Some(public_url.into()),
        }
    }

    /// Location on local disk
    #[must_use]
    pub fn local(key: ArtifactKey, path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::LocalDisk,
            key,
            path: Some(path.into()),
            public_url: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.backend == StorageBackend::RemoteObjectStore
    }

    /// A link an operator can follow: the public URL, or a `file://` URL
    #[must_use]
    pub fn link(&self) -> String {
        match (&self.public_url, &self.path) {
            (Some(url), _) => url.clone(),
            (None, Some(path)) => file_url(path),
            (None, None) => self.key.to_string(),
        }
    }
}

pub(crate) fn file_url(path: &Path) -> String {
    let display = path.display().to_string();
    if display.starts_with('/') {
        format!("file://{display}")
    } else {
        format!("file:///{display}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrashId;

    #[test]
    fn remote_location_links_public_url() {
        let key = ArtifactKey::for_run(&CrashId::new());
        let loc = ArtifactLocation::remote(key.clone(), "https://bucket.s3.us-east-1.amazonaws.com/k");
        assert!(loc.is_remote());
        assert!(loc.path.is_none());
        assert_eq!(loc.link(), "https://bucket.s3.us-east-1.amazonaws.com/k");
    }

    #[test]
    fn local_location_links_file_url() {
        let key = ArtifactKey::for_run(&CrashId::new());
        let loc = ArtifactLocation::local(key, "/var/crash/logs/a.log");
        assert!(!loc.is_remote());
        assert!(loc.public_url.is_none());
        assert_eq!(loc.link(), "file:///var/crash/logs/a.log");
    }

    #[test]
    fn backend_serializes_kebab_case() {
        let json = serde_json::to_string(&StorageBackend::LocalDisk).unwrap();
        assert_eq!(json, "\"local-disk\"");
    }
}
