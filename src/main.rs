//! `parlor`: static site, accounts and a WebSocket chat relay.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use parlor_core::logging::{LogFormat, init_subscriber};
use parlor_server::metrics::install_recorder;
use parlor_server::{ParlorServer, ServerConfig};
use parlor_settings::{ParlorSettings, load_settings_from_path, settings_path};
use parlor_store::Database;

#[derive(Debug, Parser)]
#[command(name = "parlor", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.parlor/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to bind.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,
    /// `SQLite` database file.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Directory served at `/`.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, settings: &mut ParlorSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(db) = self.db {
            settings.database.path = db.to_string_lossy().into_owned();
        }
        if let Some(dir) = self.static_dir {
            settings.server.static_dir = dir.to_string_lossy().into_owned();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let path = cli.config.take().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);
    tracing::info!(settings = %path.display(), "starting parlor");

    let db_path = PathBuf::from(&settings.database.path);
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    let mut server = ParlorServer::new(ServerConfig::from(&settings), db);
    match install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("failed to start server")?;
    tracing::info!(%addr, "parlor ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    if !server.shutdown().graceful_shutdown(vec![handle], None).await {
        tracing::warn!(
            open = server.hub().connection_count(),
            "forced exit with connections still open"
        );
    }
    Ok(())
}
