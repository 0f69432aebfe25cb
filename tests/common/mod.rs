use async_trait::async_trait;
use bytes::Bytes;
use cordvault::backend::{RemoteStore, UploadNotice};
use cordvault::common::VaultError;
use cordvault::crypto::EncryptionKey;
use cordvault::pipeline::{PipelineConfig, VaultPipeline};
use cordvault::store::MetaStore;
use futures::{Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const CHUNK: usize = 1024;

pub fn test_key() -> EncryptionKey {
    EncryptionKey::from_utf8(TEST_KEY).unwrap()
}

/// Deterministic patterned payload of length `n`.
pub fn payload(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

/// In-memory stand-in for the remote messaging backend.
#[derive(Default)]
pub struct MockBackend {
    pub blobs: Mutex<HashMap<String, Bytes>>,
    pub labels: Mutex<Vec<String>>,
    pub notices: Mutex<Vec<UploadNotice>>,
    /// Remote ids whose fetch should fail.
    pub unreachable: Mutex<HashSet<String>>,
    /// 1-based upload index that should fail, if any.
    pub fail_upload_at: Option<usize>,
    /// Artificial latency per delete call.
    pub delete_delay: Option<Duration>,
    pub next_id: AtomicUsize,
    pub uploads: AtomicUsize,
    pub deletes: AtomicUsize,
    pub in_flight_deletes: AtomicUsize,
    pub max_concurrent_deletes: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn mark_unreachable(&self, remote_id: &str) {
        self.unreachable.lock().unwrap().insert(remote_id.to_string());
    }

    pub fn corrupt_blob(&self, remote_id: &str) {
        let mut blobs = self.blobs.lock().unwrap();
        let payload = blobs.get(remote_id).expect("blob exists");
        let mut bytes = payload.to_vec();
        bytes[payload.len() / 2] ^= 0x01;
        blobs.insert(remote_id.to_string(), Bytes::from(bytes));
    }
}

#[async_trait]
impl RemoteStore for MockBackend {
    async fn upload(&self, label: &str, payload: Bytes) -> Result<String, VaultError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upload_at == Some(n) {
            return Err(VaultError::Backend(format!("injected failure at upload {}", n)));
        }
        let id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.labels.lock().unwrap().push(label.to_string());
        self.blobs.lock().unwrap().insert(id.clone(), payload);
        Ok(id)
    }

    async fn fetch(&self, remote_id: &str) -> Result<Bytes, VaultError> {
        if self.unreachable.lock().unwrap().contains(remote_id) {
            return Err(VaultError::Backend(format!("{} unreachable", remote_id)));
        }
        self.blobs
            .lock()
            .unwrap()
            .get(remote_id)
            .cloned()
            .ok_or_else(|| VaultError::Backend(format!("{} not found", remote_id)))
    }

    async fn delete(&self, remote_id: &str) -> Result<(), VaultError> {
        let current = self.in_flight_deletes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_deletes
            .fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        // Unknown ids are not an error (idempotent delete)
        self.blobs.lock().unwrap().remove(remote_id);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.in_flight_deletes.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn notify(&self, notice: UploadNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Pipeline over an in-memory store and the given backend, with pacing
/// disabled so tests run fast.
pub async fn test_pipeline(backend: Arc<dyn RemoteStore>) -> VaultPipeline {
    let store = MetaStore::open_in_memory().await.unwrap();
    VaultPipeline::new(
        store,
        backend,
        test_key(),
        PipelineConfig {
            chunk_size: CHUNK,
            upload_delay: Duration::ZERO,
            delete_workers: 8,
        },
    )
}

/// Drain a get() stream, concatenating chunks until the end or the first
/// error.
pub async fn read_stream(
    stream: impl Stream<Item = Result<Bytes, VaultError>>,
) -> (Vec<u8>, Option<VaultError>) {
    futures::pin_mut!(stream);
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => out.extend_from_slice(&chunk),
            Err(e) => return (out, Some(e)),
        }
    }
    (out, None)
}
