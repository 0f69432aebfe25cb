//! The chunked encrypted object pipeline: put, get, delete.
//!
//! Put and Get process chunks strictly in order; chunk labels, part
//! numbers, and the running content digest all depend on that order.
//! Delete is the only operation that fans out across chunks of one file.

use crate::backend::{RemoteStore, UploadNotice};
use crate::chunker::{Chunker, CHUNK_SIZE};
use crate::common::VaultError;
use crate::crypto::{self, EncryptionKey};
use crate::store::{ChunkMetadata, FileMetadata, MetaStore};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Tuning knobs for the pipeline. Defaults match the backend's limits.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Plaintext bytes per chunk.
    pub chunk_size: usize,
    /// Pause between successive chunk uploads within one Put, to stay
    /// under the backend's request-rate ceiling.
    pub upload_delay: Duration,
    /// Width of the parallel remote-delete pool.
    pub delete_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            upload_delay: Duration::from_millis(800),
            delete_workers: 8,
        }
    }
}

/// Orchestrates chunking, encryption, remote storage, and metadata for
/// logical files. Cheap to clone; safe for concurrent use.
#[derive(Clone)]
pub struct VaultPipeline {
    store: MetaStore,
    backend: Arc<dyn RemoteStore>,
    key: EncryptionKey,
    config: PipelineConfig,
}

impl VaultPipeline {
    pub fn new(
        store: MetaStore,
        backend: Arc<dyn RemoteStore>,
        key: EncryptionKey,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            key,
            config,
        }
    }

    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Store a byte stream as an encrypted, chunked logical file.
    ///
    /// Chunks are encrypted and uploaded strictly in order. Any failure
    /// aborts immediately and writes no metadata; chunks uploaded before
    /// the failure remain in the backend as orphans. On success the file
    /// row and its full chunk set are committed as one transaction, then
    /// a completion notice is fired without awaiting delivery.
    pub async fn put<R: AsyncRead + Unpin>(
        &self,
        name: &str,
        reader: R,
        origin: &'static str,
    ) -> Result<i64, VaultError> {
        let mut chunker = Chunker::new(reader, self.config.chunk_size);
        let mut hasher = Sha256::new();
        let mut remote_ids: Vec<String> = Vec::new();
        let mut total_size: i64 = 0;

        // A failure reading the caller's stream (e.g. an aborted upload
        // body) is an input fault, not a server fault.
        while let Some(chunk) = chunker
            .next_chunk()
            .await
            .map_err(|e| VaultError::BadRequest(format!("upload stream failed: {}", e)))?
        {
            if !remote_ids.is_empty() {
                // Rate limit protection between successive uploads
                tokio::time::sleep(self.config.upload_delay).await;
            }

            total_size += chunk.len() as i64;
            hasher.update(&chunk);

            let encrypted = crypto::encrypt(&self.key, &chunk)?;
            // Label derives from the ciphertext digest so remote names
            // leak nothing about plaintext structure.
            let label = format!("{:x}.vault", Sha256::digest(&encrypted));
            let remote_id = self.backend.upload(&label, Bytes::from(encrypted)).await?;

            tracing::info!(
                part = remote_ids.len() + 1,
                bytes = chunk.len(),
                "Chunk secured"
            );
            remote_ids.push(remote_id);
        }

        let hash = hex::encode(hasher.finalize());
        let file_id = self
            .store
            .create_file_with_chunks(name, total_size, &hash, &remote_ids)
            .await?;

        self.backend.notify(UploadNotice {
            name: name.to_string(),
            size: total_size,
            parts: remote_ids.len(),
            origin,
        });

        tracing::info!(file_id, name, size = total_size, parts = remote_ids.len(), "Upload complete");
        Ok(file_id)
    }

    /// Reconstruct a logical file as an ordered stream of plaintext chunks.
    ///
    /// Chunks are fetched and decrypted lazily in part order, never
    /// buffering the whole file. A failed fetch or a decryption integrity
    /// failure terminates the stream with that error; no further bytes
    /// are emitted past a failure.
    pub async fn get(
        &self,
        id: i64,
    ) -> Result<(FileMetadata, impl Stream<Item = Result<Bytes, VaultError>>), VaultError> {
        let file = self
            .store
            .get_file(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("file {}", id)))?;
        let chunks = self.store.list_chunks(id).await?;

        tracing::info!(file_id = id, name = %file.name, parts = chunks.len(), "Reconstructing object");

        let backend = self.backend.clone();
        let key = self.key.clone();
        let stream = stream::unfold(
            (chunks.into_iter(), backend, key, false),
            |(mut parts, backend, key, failed)| async move {
                if failed {
                    return None;
                }
                let chunk = parts.next()?;
                match fetch_and_decrypt(backend.as_ref(), &key, &chunk).await {
                    Ok(plaintext) => Some((Ok(plaintext), (parts, backend, key, false))),
                    Err(e) => {
                        tracing::error!(part = chunk.part_num, error = %e, "Chunk reconstruction failed");
                        Some((Err(e), (parts, backend, key, true)))
                    }
                }
            },
        );

        Ok((file, stream))
    }

    /// Remove a logical file: remote blobs first, then metadata.
    ///
    /// Remote deletes run on a bounded worker pool and are best-effort;
    /// individual failures are logged and counted but never retried and
    /// never block the others. Only after every delete attempt has
    /// returned is the metadata removed (cascading to chunk records) -
    /// its failure is the operation's failure even if blobs are gone.
    pub async fn delete(&self, id: i64) -> Result<(), VaultError> {
        let file = self
            .store
            .get_file(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("file {}", id)))?;
        let chunks = self.store.list_chunks(id).await?;

        tracing::info!(file_id = id, parts = chunks.len(), "Initiating parallel wipe");

        let failed = AtomicUsize::new(0);
        stream::iter(chunks)
            .for_each_concurrent(self.config.delete_workers, |chunk| {
                let backend = self.backend.clone();
                let failed = &failed;
                async move {
                    if let Err(e) = backend.delete(&chunk.message_id).await {
                        tracing::warn!(part = chunk.part_num, error = %e, "Remote delete failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        let failed = failed.load(Ordering::Relaxed);
        if failed > 0 {
            tracing::warn!(file_id = id, failed, "Some remote blobs may be stranded");
        }

        self.store.delete_file(id).await?;
        tracing::info!(file_id = id, name = %file.name, "File erased");
        Ok(())
    }
}

async fn fetch_and_decrypt(
    backend: &dyn RemoteStore,
    key: &EncryptionKey,
    chunk: &ChunkMetadata,
) -> Result<Bytes, VaultError> {
    let payload = backend.fetch(&chunk.message_id).await?;
    let plaintext = crypto::decrypt(key, &payload)?;
    Ok(Bytes::from(plaintext))
}
