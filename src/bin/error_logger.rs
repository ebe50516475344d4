use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil::report::{render_stats, DEFAULT_STATS_HOURS, DEFAULT_TAIL_LINES};
use vigil::{logging, VigilConfig};

#[derive(Parser)]
#[command(name = "error-logger")]
#[command(about = "Inspect the MetaBalance error logs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to ./vigil.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show error statistics
    Stats {
        /// Hours to look back
        #[arg(default_value_t = DEFAULT_STATS_HOURS)]
        hours: u32,
    },
    /// Show the last lines of errors.log
    Tail {
        /// Number of lines
        #[arg(default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,
    },
    /// Empty errors.log, errors.json and alerts.log
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = VigilConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging.level, None, config.error_log.rotation)?;

    let store = config.error_log.store(&config.paths().log_dir);
    match cli.command {
        Command::Stats { hours } => {
            print!("{}", render_stats(&store.query_stats(hours), hours));
        }
        Command::Tail { lines } => {
            for line in store.tail(lines)? {
                println!("{}", line);
            }
        }
        Command::Clear => {
            store.clear()?;
            println!("Error logs cleared");
        }
    }
    Ok(())
}
