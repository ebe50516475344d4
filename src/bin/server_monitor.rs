use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil::{logging, DaemonLifecycle, VigilConfig};

#[derive(Parser)]
#[command(name = "server-monitor")]
#[command(about = "Keep the MetaBalance server running", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to ./vigil.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Command {
    /// Run the monitor in the foreground (default)
    #[default]
    Start,
    /// Signal the running monitor to shut down
    Stop,
    /// Stop, then start again
    Restart,
    /// Show monitor and server health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = VigilConfig::load(cli.config.as_deref())?;
    let paths = config.paths();
    logging::init(
        &config.logging.level,
        Some(paths.monitor_log.as_path()),
        config.error_log.rotation,
    )?;

    let daemon = DaemonLifecycle::new(config);
    let code = match cli.command.unwrap_or_default() {
        Command::Start => daemon.start().await?,
        Command::Stop => daemon.stop().await,
        Command::Restart => daemon.restart().await?,
        Command::Status => daemon.status().await?,
    };
    std::process::exit(code);
}
