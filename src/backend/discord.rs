//! Discord REST adapter: channel messages with attachments as blob storage.

use crate::backend::{RemoteStore, UploadNotice};
use crate::common::VaultError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, multipart, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

const API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const NOTICE_QUEUE_DEPTH: usize = 32;

#[derive(Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Deserialize)]
struct Attachment {
    url: String,
}

#[derive(Deserialize)]
struct Application {
    id: String,
}

/// Long-lived Discord session shared by all pipeline operations.
pub struct DiscordBackend {
    http: Client,
    token: String,
    channel_id: String,
    notices: mpsc::Sender<UploadNotice>,
}

impl DiscordBackend {
    pub fn new(token: &str, channel_id: &str) -> Result<std::sync::Arc<Self>, VaultError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let (tx, rx) = mpsc::channel(NOTICE_QUEUE_DEPTH);
        let backend = std::sync::Arc::new(Self {
            http: http.clone(),
            token: token.to_string(),
            channel_id: channel_id.to_string(),
            notices: tx,
        });

        tokio::spawn(drain_notices(
            rx,
            http,
            token.to_string(),
            channel_id.to_string(),
        ));

        Ok(backend)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Register the slash commands for the command front-end.
    /// Individual registration failures are logged, not fatal.
    pub async fn register_commands(&self) -> Result<(), VaultError> {
        let app: Application = self
            .http
            .get(format!("{API_BASE}/applications/@me"))
            .header(header::AUTHORIZATION, self.auth())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let commands = json!([
            { "name": "help", "description": "Show available commands" },
            { "name": "ping", "description": "Check bot latency" },
            { "name": "list", "description": "List all stored files" },
            { "name": "upload", "description": "Upload a file to the vault", "options": [
                { "type": 11, "name": "file", "description": "File to upload", "required": true }
            ]},
            { "name": "delete", "description": "Delete a file from the vault", "options": [
                { "type": 4, "name": "id", "description": "File ID", "required": true }
            ]},
        ]);

        let resp = self
            .http
            .put(format!("{API_BASE}/applications/{}/commands", app.id))
            .header(header::AUTHORIZATION, self.auth())
            .json(&commands)
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "Slash command registration failed");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for DiscordBackend {
    async fn upload(&self, label: &str, payload: Bytes) -> Result<String, VaultError> {
        let part = multipart::Part::stream(payload)
            .file_name(label.to_string())
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part("files[0]", part);

        let resp = self
            .http
            .post(format!("{API_BASE}/channels/{}/messages", self.channel_id))
            .header(header::AUTHORIZATION, self.auth())
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(VaultError::Backend(format!(
                "upload rejected with status {}",
                resp.status()
            )));
        }

        let msg: Message = resp.json().await?;
        Ok(msg.id)
    }

    async fn fetch(&self, remote_id: &str) -> Result<Bytes, VaultError> {
        // Resolve the attachment URL from the message, then pull the bytes.
        let resp = self
            .http
            .get(format!(
                "{API_BASE}/channels/{}/messages/{}",
                self.channel_id, remote_id
            ))
            .header(header::AUTHORIZATION, self.auth())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(VaultError::Backend(format!(
                "message {} lookup failed with status {}",
                remote_id,
                resp.status()
            )));
        }

        let msg: Message = resp.json().await?;
        let attachment = msg.attachments.first().ok_or_else(|| {
            VaultError::Backend(format!("message {} has no attachment", remote_id))
        })?;

        let blob = self
            .http
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(blob)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), VaultError> {
        let resp = self
            .http
            .delete(format!(
                "{API_BASE}/channels/{}/messages/{}",
                self.channel_id, remote_id
            ))
            .header(header::AUTHORIZATION, self.auth())
            .send()
            .await?;

        // Already gone counts as deleted
        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(VaultError::Backend(format!(
            "delete of {} failed with status {}",
            remote_id,
            resp.status()
        )))
    }

    fn notify(&self, notice: UploadNotice) {
        // Bounded queue: a full queue drops the notice rather than block
        if let Err(e) = self.notices.try_send(notice) {
            tracing::warn!(error = %e, "Upload notice dropped");
        }
    }
}

/// Background drain for the completion notice queue.
async fn drain_notices(
    mut rx: mpsc::Receiver<UploadNotice>,
    http: Client,
    token: String,
    channel_id: String,
) {
    while let Some(notice) = rx.recv().await {
        let content = format!(
            "**{} Upload Complete**\n**File:** `{}`\n**Size:** `{}`\n**Parts:** {}\n**Status:** Encrypted & Locked",
            notice.origin,
            notice.name,
            format_bytes(notice.size),
            notice.parts
        );
        let result = http
            .post(format!("{API_BASE}/channels/{}/messages", channel_id))
            .header(header::AUTHORIZATION, format!("Bot {}", token))
            .json(&json!({ "content": content }))
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Upload notice delivery failed");
        }
    }
}

/// Human-readable byte count for notices and listings.
pub fn format_bytes(bytes: i64) -> String {
    const UNIT: i64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, b"KMGTPE"[exp] as char)
}

#[cfg(test)]
mod tests {
    use super::format_bytes;

    #[test]
    fn formats_byte_counts() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(7 * 1024 * 1024), "7.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }
}
