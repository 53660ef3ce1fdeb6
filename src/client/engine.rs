//! Chunker → existence negotiation → bounded-parallel transfer → reassembly.

use super::api::ApiClient;
use crate::hasher;
use crate::wire::UploadRequest;
use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Upload and download both fan out at most this many requests at once.
const MAX_IN_FLIGHT: usize = 5;

pub struct ClientEngine {
    api: ApiClient,
}

impl ClientEngine {
    pub fn new(api: ApiClient) -> Self {
        ClientEngine { api }
    }

    pub async fn upload_file(&self, path: &Path) -> Result<UploadOutcome> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("statting {}", path.display()))?;
        if metadata.len() == 0 {
            bail!("refusing to upload an empty file: {}", path.display());
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let (chunks, file_digest) = hasher::split_stream(std::io::Cursor::new(bytes))?;

        let existence = self.api.check_one(&file_digest).await?;
        if existence.exists {
            log::info!("file {} is already stored, skipping upload", file_digest);
            return Ok(UploadOutcome {
                file_digest,
                already_present: true,
                mismatched_chunks: Vec::new(),
            });
        }

        let all_digests: Vec<String> = chunks.iter().map(|c| c.digest.clone()).collect();
        let missing = self.api.check_many(&all_digests).await?.missing;
        let missing_set: HashSet<String> = missing.into_iter().collect();

        let mismatched: Vec<String> = stream::iter(chunks.into_iter().map(|chunk| {
            let needs_content = missing_set.contains(&chunk.digest);
            let api = &self.api;
            let file_digest = file_digest.clone();
            async move {
                let content = if needs_content {
                    Some(base64::encode(&chunk.data))
                } else {
                    None
                };
                let request = UploadRequest {
                    file_hash: file_digest,
                    chunk_hash: chunk.digest.clone(),
                    chunk_order: chunk.order,
                    content,
                };
                log::debug!("uploading chunk {} (order {})", chunk.digest, chunk.order);
                let response = api.upload_chunk(&request).await?;
                if response.hash_mismatch {
                    log::warn!("server reported a hash mismatch for chunk {}", chunk.digest);
                    Ok::<Option<String>, anyhow::Error>(Some(chunk.digest))
                } else {
                    Ok(None)
                }
            }
        }))
        .buffer_unordered(MAX_IN_FLIGHT)
        .try_collect::<Vec<Option<String>>>()
        .await?
        .into_iter()
        .flatten()
        .collect();

        Ok(UploadOutcome {
            file_digest,
            already_present: false,
            mismatched_chunks: mismatched,
        })
    }

    pub async fn download_file(&self, file_digest: &str, out_dir: &Path, name: &str) -> Result<PathBuf> {
        let existence = self.api.check_one(file_digest).await?;
        if !existence.exists {
            bail!("no file stored under digest {}", file_digest);
        }

        let manifest = self.api.download_manifest(file_digest).await?;

        let fetched: Vec<(usize, Vec<u8>)> = stream::iter(manifest.chunk_hashes.into_iter().enumerate().map(
            |(index, digest)| {
                let api = &self.api;
                async move {
                    log::debug!("downloading chunk {} (position {})", digest, index);
                    let bytes = api.get_chunk_bytes(&digest).await?;
                    let (ok, computed) = hasher::verify(&bytes, &digest);
                    if !ok {
                        bail!(
                            "downloaded chunk {} does not match its digest (computed {})",
                            digest,
                            computed
                        );
                    }
                    Ok::<(usize, Vec<u8>), anyhow::Error>((index, bytes))
                }
            },
        ))
        .buffer_unordered(MAX_IN_FLIGHT)
        .try_collect()
        .await?;

        let mut ordered = fetched;
        ordered.sort_by_key(|(index, _)| *index);
        let chunk_bytes: Vec<Vec<u8>> = ordered.into_iter().map(|(_, bytes)| bytes).collect();

        hasher::combine(&chunk_bytes, out_dir, name)?;
        Ok(out_dir.join(name))
    }
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub file_digest: String,
    pub already_present: bool,
    pub mismatched_chunks: Vec<String>,
}
