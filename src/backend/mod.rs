//! Remote blob storage behind an opaque-identifier interface.
//!
//! The pipeline only ever sees `upload`/`fetch`/`delete` plus a
//! fire-and-forget completion notice; the Discord implementation lives in
//! [`discord`]. Tests substitute their own implementation.

pub mod discord;

pub use discord::DiscordBackend;

use crate::common::VaultError;
use async_trait::async_trait;
use bytes::Bytes;

/// Completion event emitted after a successful upload.
#[derive(Debug, Clone)]
pub struct UploadNotice {
    pub name: String,
    pub size: i64,
    pub parts: usize,
    /// Ingress surface that produced the upload ("Web" or "Bot").
    pub origin: &'static str,
}

/// Storage operations the pipeline requires from the remote service.
///
/// Implementations must be safe for concurrent use; a single long-lived
/// handle is shared by all pipeline operations.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload a named blob, returning the backend's opaque identifier.
    async fn upload(&self, label: &str, payload: Bytes) -> Result<String, VaultError>;

    /// Fetch a blob's content by its remote identifier.
    async fn fetch(&self, remote_id: &str) -> Result<Bytes, VaultError>;

    /// Delete a blob. Deleting an unknown or already-deleted identifier
    /// is not an error.
    async fn delete(&self, remote_id: &str) -> Result<(), VaultError>;

    /// Enqueue a completion notice. Never blocks and never fails the
    /// caller; delivery is best-effort on a background task.
    fn notify(&self, notice: UploadNotice);
}
