//! taiga-etl command-line entry point.
//!
//! This binary is the composition root. It:
//!
//! 1. **Parses configuration**: command-line flags plus a JSON config file
//!    holding the Taiga connection, client tuning, and run options.
//! 2. **Wires observability**: `tracing-subscriber` to stderr, with an
//!    OpenTelemetry OTLP layer when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Constructs infrastructure**: the rate-limited [`api_client::AsyncApiClient`]
//!    and the in-memory [`store::MemoryStore`], optionally restored from a
//!    state file, and injects them into the Taiga plugin.
//! 4. **Runs the command**. Ctrl-C cancels a running pipeline; the current
//!    stage stops at its next suspension point.

mod args;
mod commands;
mod config;
mod telemetry;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::args::{Cli, Command};
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.log_json)?;

    let result = async {
        let config = CliConfig::load(&cli.config).await?;
        match cli.command {
            Command::Run {
                projects,
                full_resync,
                state_file,
            } => {
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, cancelling run");
                        on_signal.cancel();
                    }
                });
                commands::run(config, projects, full_resync, state_file.as_deref(), cancel).await
            }
            Command::TestConnection => commands::check_connection(config).await,
            Command::RemoteProjects {
                search,
                page,
                page_size,
            } => commands::remote_projects(config, search, page, page_size).await,
        }
    }
    .await;

    telemetry.shutdown();
    result
}
