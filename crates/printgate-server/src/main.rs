// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate: LAN print server.
//
// Entry point. Initialises logging, resolves configuration (file, then
// environment, then flags), checks for the external tools and serves HTTP.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use printgate_core::AppConfig;
use printgate_core::config::default_data_dir;
use printgate_core::error::Result;
use printgate_server::{AppServices, router, startup};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "printgate", version, about = "Browser-facing print server for a local CUPS printer")]
struct Cli {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Directory for uploads, conversions, settings and config.json.
    #[arg(long, env = "PRINTGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "printgate stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let base = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut config = AppConfig::load(&base)?;
    config.apply_env();
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    tracing::info!(data_dir = %config.data_dir.display(), "Printgate starting");
    startup::check_dependencies(&config);

    let (bind, port) = (config.bind.clone(), config.port);
    let services = AppServices::init(config)?;
    let listener = TcpListener::bind((bind.as_str(), port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Printgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
