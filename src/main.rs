use clap::{Parser, Subcommand};
use cordvault::backend::DiscordBackend;
use cordvault::common::Config;
use cordvault::pipeline::{PipelineConfig, VaultPipeline};
use cordvault::server::{self, AppState};
use cordvault::store::MetaStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cordvault")]
#[command(about = "Encrypted chunked file vault backed by Discord attachments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vault server
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,

        /// SQLite metadata database path
        #[arg(long, default_value = "sqlite://metadata.db")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; system environment wins when absent
    if dotenv::dotenv().is_err() {
        eprintln!("Note: .env file not found, using system environment variables.");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { addr, db } => run_server(&addr, &db).await,
    }
}

async fn run_server(addr: &str, db: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = MetaStore::open(db).await?;
    let backend = DiscordBackend::new(&config.token, &config.channel_id)?;

    if let Err(e) = backend.register_commands().await {
        tracing::warn!(error = %e, "Could not register slash commands");
    }

    let pipeline = VaultPipeline::new(
        store,
        backend,
        config.key.clone(),
        PipelineConfig::default(),
    );

    let state = AppState::new(pipeline, config);
    server::serve(state, addr).await
}
