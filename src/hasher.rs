//! Fixed-size chunking and the content-address derivations that tie a chunk's
//! bytes to its digest, and a file's chunk list to its file digest.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Chunk size is fixed; interop between client and server depends on it.
pub const CHUNK_SIZE: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub order: u32,
    pub data: Vec<u8>,
    pub digest: String,
}

/// Lowercase hex SHA-256 of `data`.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Reads `reader` to completion, splitting it into `CHUNK_SIZE` blocks.
///
/// The file digest is SHA-256 over the concatenation of the ASCII hex chunk
/// digests in order, not the raw bytes — this must match exactly or the
/// existence precheck across client/server never agrees.
pub fn split_stream<R: Read>(mut reader: R) -> Result<(Vec<Chunk>, String)> {
    let mut chunks = Vec::new();
    let mut file_hasher = Sha256::new();
    let mut order: u32 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_full(&mut reader, &mut buf).context("reading input stream")?;
        if n == 0 {
            break;
        }
        order += 1;
        let data = buf[..n].to_vec();
        let digest = digest_bytes(&data);
        file_hasher.update(digest.as_bytes());
        chunks.push(Chunk {
            order,
            data,
            digest,
        });
        if n < CHUNK_SIZE {
            break;
        }
    }

    if chunks.len() == 1 {
        let only_digest = chunks[0].digest.clone();
        return Ok((chunks, only_digest));
    }

    let file_digest = hex::encode(file_hasher.finalize());
    Ok((chunks, file_digest))
}

/// Reads until `buf` is full or the stream is exhausted, returning the
/// number of bytes actually read (may be less than `buf.len()` at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Recomputes the digest of `data` and reports whether it matches `expected`.
pub fn verify(data: &[u8], expected_digest: &str) -> (bool, String) {
    let computed = digest_bytes(data);
    (computed == expected_digest, computed)
}

/// Writes `chunks` back to back into `out_dir/name`, in the order given by
/// the caller (callers are expected to have already sorted by chunk_order).
pub fn combine(chunks: &[Vec<u8>], out_dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(name);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    use std::io::Write;
    for chunk in chunks {
        file.write_all(chunk)
            .with_context(|| format!("writing to {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn single_chunk_file_digest_equals_chunk_digest() {
        let data = b"Hello World!".to_vec();
        let expected = digest_bytes(&data);
        let (chunks, file_digest) = split_stream(Cursor::new(data)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].digest, expected);
        assert_eq!(file_digest, expected);
    }

    #[test]
    fn multi_chunk_file_digest_is_hash_of_hex_digests() {
        let mut data = Vec::new();
        data.extend(std::iter::repeat(1u8).take(CHUNK_SIZE));
        data.extend(std::iter::repeat(2u8).take(CHUNK_SIZE));
        data.extend(std::iter::repeat(3u8).take(100));
        let (chunks, file_digest) = split_stream(Cursor::new(data)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].order, 1);
        assert_eq!(chunks[2].order, 3);

        let mut expect_hasher = Sha256::new();
        for c in &chunks {
            expect_hasher.update(c.digest.as_bytes());
        }
        assert_eq!(file_digest, hex::encode(expect_hasher.finalize()));
    }

    #[test]
    fn verify_detects_mismatch() {
        let (ok, computed) = verify(b"abc", "not-a-real-digest");
        assert!(!ok);
        assert_eq!(computed, digest_bytes(b"abc"));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let (chunks, _digest) = split_stream(Cursor::new(Vec::<u8>::new())).unwrap();
        assert!(chunks.is_empty());
    }
}
