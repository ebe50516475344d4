use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vigil::{health_check, logging, VigilConfig};

#[derive(Parser)]
#[command(name = "health-check")]
#[command(about = "Check the MetaBalance server and restart it when unhealthy", version)]
struct Cli {
    /// Keep checking on the configured interval until interrupted
    #[arg(long)]
    watch: bool,

    /// Configuration file (defaults to ./vigil.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = VigilConfig::load(cli.config.as_deref())?;
    let paths = config.paths();
    logging::init(
        &config.logging.level,
        Some(paths.health_check_log.as_path()),
        config.error_log.rotation,
    )?;

    let code = if cli.watch {
        health_check::run_watch(&config).await?
    } else {
        health_check::run_once(&config).await?
    };
    std::process::exit(code);
}
