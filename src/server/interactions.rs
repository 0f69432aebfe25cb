//! Command front-end: slash-command interaction dispatch.
//!
//! Discord delivers interactions as JSON posts; responses are either an
//! immediate message or a deferred acknowledgement followed up through
//! the interaction webhook once the pipeline finishes.

use crate::backend::discord::format_bytes;
use crate::pipeline::VaultPipeline;
use crate::server::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;

const HELP_TEXT: &str = "**Vault Commands**\n\
    `/upload` - Store a file securely\n\
    `/list` - List all stored files\n\
    `/delete [id]` - Purge a file from the vault\n\
    `/ping` - Check the vault is alive";

#[derive(Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    application_id: Option<String>,
    token: Option<String>,
    data: Option<CommandData>,
    member: Option<Member>,
    user: Option<User>,
}

#[derive(Deserialize)]
struct Member {
    user: User,
}

#[derive(Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct CommandData {
    name: String,
    #[serde(default)]
    options: Vec<CommandOption>,
    resolved: Option<Resolved>,
}

#[derive(Deserialize)]
struct CommandOption {
    name: String,
    value: Value,
}

#[derive(Deserialize)]
struct Resolved {
    #[serde(default)]
    attachments: HashMap<String, ResolvedAttachment>,
}

#[derive(Deserialize, Clone)]
struct ResolvedAttachment {
    url: String,
    filename: String,
}

fn message(content: impl Into<String>) -> Json<Value> {
    Json(json!({ "type": 4, "data": { "content": content.into() } }))
}

fn ephemeral(content: &str) -> Json<Value> {
    Json(json!({ "type": 4, "data": { "content": content, "flags": 64 } }))
}

fn deferred() -> Json<Value> {
    Json(json!({ "type": 5 }))
}

pub async fn interaction_handler(
    State(state): State<AppState>,
    Json(interaction): Json<Interaction>,
) -> Json<Value> {
    // Type 1 is the liveness ping from the platform
    if interaction.kind == 1 {
        return Json(json!({ "type": 1 }));
    }
    if interaction.kind != 2 {
        return ephemeral("Unsupported interaction.");
    }

    let user = match interaction
        .member
        .as_ref()
        .map(|m| &m.user)
        .or(interaction.user.as_ref())
    {
        Some(u) => u,
        None => return ephemeral("Unknown caller."),
    };

    if !state.config.is_allowed(&user.id) {
        tracing::warn!(user = %user.username, "Unauthorized command attempt");
        return ephemeral("Access Denied.");
    }

    let data = match interaction.data.as_ref() {
        Some(d) => d,
        None => return ephemeral("Malformed command."),
    };
    tracing::info!(command = %data.name, user = %user.username, "Command received");

    match data.name.as_str() {
        "ping" => message("Pong!"),
        "help" => message(HELP_TEXT),
        "list" => handle_list(&state.pipeline).await,
        "upload" => handle_upload(&state, &interaction, data),
        "delete" => handle_delete(&state, &interaction, data),
        other => ephemeral(&format!("Unknown command: {}", other)),
    }
}

async fn handle_list(pipeline: &VaultPipeline) -> Json<Value> {
    let files = match pipeline.store().list_files().await {
        Ok(files) => files,
        Err(e) => {
            tracing::error!(error = %e, "Listing failed");
            return ephemeral("Database error.");
        }
    };

    let mut out = String::from("**Vault Assets:**\n\n");
    if files.is_empty() {
        out.push_str("*Empty*");
    }
    for f in files {
        out.push_str(&format!("`#{}` **{}** ({})\n", f.id, f.name, format_bytes(f.size)));
    }
    message(out)
}

fn handle_upload(state: &AppState, interaction: &Interaction, data: &CommandData) -> Json<Value> {
    let attachment = data
        .options
        .iter()
        .find(|o| o.name == "file")
        .and_then(|o| o.value.as_str())
        .and_then(|id| data.resolved.as_ref()?.attachments.get(id))
        .cloned();
    let Some(attachment) = attachment else {
        return ephemeral("No file attached.");
    };
    let Some(followup) = Followup::from(state, interaction) else {
        return ephemeral("Malformed interaction.");
    };

    let pipeline = state.pipeline.clone();
    let http = state.http.clone();
    tokio::spawn(async move {
        let content = match run_upload(&pipeline, &http, &attachment).await {
            Ok(file_id) => format!("Object secured. ID: **#{}**", file_id),
            Err(e) => {
                tracing::error!(error = %e, "Bot upload failed");
                "Upload failed.".to_string()
            }
        };
        followup.send(&content).await;
    });

    deferred()
}

async fn run_upload(
    pipeline: &VaultPipeline,
    http: &reqwest::Client,
    attachment: &ResolvedAttachment,
) -> anyhow::Result<i64> {
    let payload = http
        .get(&attachment.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let file_id = pipeline
        .put(&attachment.filename, Cursor::new(payload), "Bot")
        .await?;
    Ok(file_id)
}

fn handle_delete(state: &AppState, interaction: &Interaction, data: &CommandData) -> Json<Value> {
    let id = data
        .options
        .iter()
        .find(|o| o.name == "id")
        .and_then(|o| o.value.as_i64());
    let Some(id) = id else {
        return ephemeral("Missing file id.");
    };
    let Some(followup) = Followup::from(state, interaction) else {
        return ephemeral("Malformed interaction.");
    };

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let content = match pipeline.delete(id).await {
            Ok(()) => "Purge complete.".to_string(),
            Err(e) => {
                tracing::error!(file_id = id, error = %e, "Bot delete failed");
                "Purge failed.".to_string()
            }
        };
        followup.send(&content).await;
    });

    deferred()
}

/// Edits the deferred interaction response once background work finishes.
struct Followup {
    http: reqwest::Client,
    application_id: String,
    token: String,
}

impl Followup {
    fn from(state: &AppState, interaction: &Interaction) -> Option<Self> {
        Some(Self {
            http: state.http.clone(),
            application_id: interaction.application_id.clone()?,
            token: interaction.token.clone()?,
        })
    }

    async fn send(&self, content: &str) {
        let url = format!(
            "https://discord.com/api/v10/webhooks/{}/{}/messages/@original",
            self.application_id, self.token
        );
        if let Err(e) = self
            .http
            .patch(&url)
            .json(&json!({ "content": content }))
            .send()
            .await
        {
            tracing::warn!(error = %e, "Interaction followup failed");
        }
    }
}
