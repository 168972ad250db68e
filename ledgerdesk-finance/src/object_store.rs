//! Local content-addressed store for uploaded statement files.

use anyhow::{Context, Result};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// Path relative to the store root, e.g. `statements/3f/3f2a....pdf`.
    pub key: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Store `bytes` under their digest. Same bytes, same key; an existing
    /// object is left in place.
    pub fn put_statement(&self, bytes: &[u8], extension: &str) -> Result<StoredObject> {
        let sha1 = sha1_hex(bytes);
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        let ext = if ext.is_empty() { "bin".to_string() } else { ext };
        let key = format!("statements/{}/{sha1}.{ext}", &sha1[..2]);
        let path = self.path_of(&key);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create object dir {}", parent.display()))?;
            }
            // Objects appear under their key only once fully written.
            let tmp = path.with_extension(format!("{ext}.part"));
            std::fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
            std::fs::rename(&tmp, &path)
                .with_context(|| format!("move object into place {}", path.display()))?;
            debug!(%key, size = bytes.len(), "stored statement object");
        }

        Ok(StoredObject {
            key,
            sha1,
            size: bytes.len() as u64,
        })
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_of(key);
        std::fs::read(&path).with_context(|| format!("read object {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let a = store.put_statement(b"%PDF-1.4 hello", "PDF").unwrap();
        let b = store.put_statement(b"%PDF-1.4 hello", ".pdf").unwrap();
        assert_eq!(a, b);
        assert!(a.key.starts_with("statements/"));
        assert!(a.key.ends_with(".pdf"));
        assert_eq!(store.get(&a.key).unwrap(), b"%PDF-1.4 hello");
    }

    #[test]
    fn known_digest() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
