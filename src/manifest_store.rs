//! Per-file manifests: ordered `(chunk_order, chunk_hash)` lists keyed by
//! file digest, stored as one JSON file per file digest under
//! `storage_root/meta`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub chunk_order: u32,
    pub chunk_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub chunks: Vec<ManifestEntry>,
}

pub struct ManifestStore {
    root: PathBuf,
    /// Per-file-digest locks so concurrent appends to the same manifest
    /// serialize instead of racing on read-modify-write.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ManifestStore {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        ManifestStore {
            root: storage_root.into().join("meta"),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, file_digest: &str) -> PathBuf {
        let prefix = &file_digest[..4.min(file_digest.len())];
        self.root.join(prefix).join(file_digest)
    }

    async fn lock_for(&self, file_digest: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(file_digest.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// No-op success if the exact `(order, chunk_digest)` pair is already
    /// present; otherwise appends and rewrites the manifest atomically.
    pub async fn append_entry(&self, file_digest: &str, chunk_digest: &str, order: u32) -> Result<()> {
        let file_lock = self.lock_for(file_digest).await;
        let _guard = file_lock.lock().await;

        let path = self.path_for(file_digest);
        let mut manifest = self.read_manifest_at(&path).await?.unwrap_or_default();

        let already_present = manifest
            .chunks
            .iter()
            .any(|e| e.chunk_order == order && e.chunk_hash == chunk_digest);
        if already_present {
            return Ok(());
        }

        manifest.chunks.push(ManifestEntry {
            chunk_order: order,
            chunk_hash: chunk_digest.to_string(),
        });

        let parent = path.parent().expect("manifest path always has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating shard directory {}", parent.display()))?;
        let serialized = serde_json::to_vec(&manifest).context("serializing manifest")?;
        let tmp_path = parent.join(format!(".{}.tmp", file_digest));
        tokio::fs::write(&tmp_path, &serialized)
            .await
            .with_context(|| format!("writing temp manifest {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("renaming manifest into place at {}", path.display()))?;
        Ok(())
    }

    pub async fn get_manifest(&self, file_digest: &str) -> Result<Manifest> {
        let path = self.path_for(file_digest);
        self.read_manifest_at(&path)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no manifest for file digest {}", file_digest))
    }

    pub async fn file_exists(&self, file_digest: &str) -> bool {
        tokio::fs::metadata(self.path_for(file_digest)).await.is_ok()
    }

    async fn read_manifest_at(&self, path: &Path) -> Result<Option<Manifest>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let manifest: Manifest = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parsing manifest {}", path.display()))?;
                Ok(Some(manifest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading manifest {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_creates_manifest_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let f = "f".repeat(64);
        assert!(!store.file_exists(&f).await);
        store.append_entry(&f, "c1", 1).await.unwrap();
        assert!(store.file_exists(&f).await);
    }

    #[tokio::test]
    async fn append_is_idempotent_for_same_triple() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let f = "f".repeat(64);
        store.append_entry(&f, "c1", 1).await.unwrap();
        store.append_entry(&f, "c1", 1).await.unwrap();
        let manifest = store.get_manifest(&f).await.unwrap();
        assert_eq!(manifest.chunks.len(), 1);
    }

    #[tokio::test]
    async fn entries_preserve_insertion_and_sort_by_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let f = "f".repeat(64);
        store.append_entry(&f, "c2", 2).await.unwrap();
        store.append_entry(&f, "c1", 1).await.unwrap();
        let mut manifest = store.get_manifest(&f).await.unwrap();
        manifest.chunks.sort_by_key(|e| e.chunk_order);
        let ordered: Vec<_> = manifest.chunks.iter().map(|e| e.chunk_hash.clone()).collect();
        assert_eq!(ordered, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[tokio::test]
    async fn get_manifest_missing_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        assert!(store.get_manifest(&"z".repeat(64)).await.is_err());
    }
}
