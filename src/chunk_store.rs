//! Content-addressed chunk blob storage, sharded two levels deep under
//! `storage_root/blocks`.

use crate::hasher::digest_bytes;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        ChunkStore {
            root: storage_root.into().join("blocks"),
        }
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        let prefix = &digest[..4.min(digest.len())];
        self.root.join(prefix).join(digest)
    }

    /// Idempotent: if a blob already exists under `digest`, returns without
    /// touching it. Otherwise writes `bytes` atomically (temp file + rename)
    /// and returns the digest actually computed from `bytes`, which may
    /// differ from `digest` if the caller's claim was wrong.
    pub async fn save_chunk(&self, digest: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(digest);
        if tokio::fs::metadata(&path).await.is_ok() {
            return Ok(digest.to_string());
        }
        let parent = path.parent().expect("chunk path always has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating shard directory {}", parent.display()))?;

        let computed = digest_bytes(bytes);
        let tmp_path = parent.join(format!(".{}.tmp", digest));
        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("writing temp chunk file {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("renaming chunk into place at {}", path.display()))?;
        Ok(computed)
    }

    pub async fn get_chunk(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.path_for(digest);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading chunk {}", path.display()))?;
        Ok(bytes)
    }

    pub async fn chunk_exists(&self, digest: &str) -> bool {
        tokio::fs::metadata(self.path_for(digest)).await.is_ok()
    }

    /// Partitions `digests` into `(existing, missing)`, preserving input order
    /// in each output.
    pub async fn check_many(&self, digests: &[String]) -> Result<(Vec<String>, Vec<String>)> {
        let mut existing = Vec::with_capacity(digests.len());
        let mut missing = Vec::new();
        for d in digests {
            if self.chunk_exists(d).await {
                existing.push(d.clone());
            } else {
                missing.push(d.clone());
            }
        }
        Ok((existing, missing))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let digest = digest_bytes(b"hello chunk");
        store.save_chunk(&digest, b"hello chunk").await.unwrap();
        let read_back = store.get_chunk(&digest).await.unwrap();
        assert_eq!(read_back, b"hello chunk");
    }

    #[tokio::test]
    async fn save_chunk_is_idempotent_first_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let digest = "a".repeat(64);
        store.save_chunk(&digest, b"first").await.unwrap();
        store.save_chunk(&digest, b"second").await.unwrap();
        let read_back = store.get_chunk(&digest).await.unwrap();
        assert_eq!(read_back, b"first");
    }

    #[tokio::test]
    async fn check_many_partitions_by_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let present = digest_bytes(b"present");
        store.save_chunk(&present, b"present").await.unwrap();
        let absent = "f".repeat(64);

        let (existing, missing) = store
            .check_many(&[present.clone(), absent.clone()])
            .await
            .unwrap();
        assert_eq!(existing, vec![present]);
        assert_eq!(missing, vec![absent]);
    }

    #[tokio::test]
    async fn shard_prefix_is_first_four_hex_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let digest = digest_bytes(b"shard me");
        store.save_chunk(&digest, b"shard me").await.unwrap();
        let expected = dir
            .path()
            .join("blocks")
            .join(&digest[..4])
            .join(&digest);
        assert!(expected.exists());
    }
}
