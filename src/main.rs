//! # Routine Loader CLI (`rload`)
//!
//! Loads MySQL stored routines from annotated pseudo-SQL sources and writes
//! their metadata for the wrapper generator.
//!
//! ## Usage
//!
//! ```bash
//! rload --config ./config/rload.toml load                 # every source under loader.source_dir
//! rload load lib/psql/abc_order_get.psql                  # only the given files
//! RUST_LOG=debug rload load                               # include reload reasons
//! ```
//!
//! A routine is only reloaded when its source, a placeholder it uses, or the
//! configured SQL mode, character set or collation changed since the last
//! run. The command exits with a non-zero status if any routine failed.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use routine_loader::{config, loader};

/// Routine Loader CLI: loads stored routines into MySQL and records their
/// metadata.
#[derive(Parser)]
#[command(
    name = "rload",
    about = "Loads MySQL stored routines from annotated pseudo-SQL sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rload.toml`.
    #[arg(long, global = true, default_value = "./config/rload.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load stored routines.
    ///
    /// Without arguments, every source under `loader.source_dir` matching
    /// the include globs is considered, and metadata of routines whose
    /// source disappeared is removed. Unchanged routines are skipped.
    Load {
        /// Only load these source files.
        files: Vec<PathBuf>,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.logging.level.to_lowercase());

    match cli.command {
        Commands::Load { files } => {
            let report = loader::run_load(&cfg, files).await?;
            report.print_summary();
            if report.has_failures() {
                bail!("{} routine(s) failed to load", report.failed.len());
            }
        }
    }

    Ok(())
}
