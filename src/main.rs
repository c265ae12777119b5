//! CLI Entry Point for ev_logger
//!
//! Provides command-line interface for:
//! - Running a simulated capture session against a host directory
//! - Converting a captured data file to CSV
//! - Printing the effective configuration
//!
//! # Usage
//!
//! Capture for five seconds:
//! ```bash
//! ev_logger run --duration-ms 5000
//! ```
//!
//! Convert a data file:
//! ```bash
//! ev_logger parse card/data.log --output data.csv
//! ```
//!
//! Show the configuration after file and environment overrides:
//! ```bash
//! EV_LOGGER_STORAGE__NUMBERED_SESSIONS=true ev_logger config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ev_logger::config::{LoggerConfig, DEFAULT_CONFIG_PATH};
use ev_logger::data::record::{decode_records, write_csv};
use ev_logger::data::sample::ANALOG_CHANNELS;
use ev_logger::platform;
use ev_logger::tracing_config::{self, OutputFormat, TracingConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ev_logger")]
#[command(about = "Fixed-rate EV data logger (host simulation and tools)", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format (pretty, compact, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one simulated session to the configured storage directory
    Run {
        /// How long to log before pressing the button again
        #[arg(long, default_value = "5000")]
        duration_ms: u64,

        /// Seed for the synthetic sensor model
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Override the storage directory
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Decode a data file into CSV
    Parse {
        /// Data file written by the logger
        input: PathBuf,

        /// Output CSV (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LoggerConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match &cli.log_format {
        Some(format) => {
            let format: OutputFormat = format.parse()?;
            tracing_config::init(TracingConfig::from_logger_config(&config)?.with_format(format))?;
        }
        None => tracing_config::init_from_config(&config)?,
    }

    match cli.command {
        Commands::Run {
            duration_ms,
            seed,
            root,
        } => {
            if let Some(root) = root {
                config.storage.root = root;
            }
            run_session(&config, Duration::from_millis(duration_ms), seed).await
        }
        Commands::Parse { input, output } => parse_file(input, output),
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}

async fn run_session(config: &LoggerConfig, duration: Duration, seed: u64) -> Result<()> {
    info!(name = %config.application.name, root = %config.storage.root.display(), "starting simulated session");

    let report = platform::run_session(config, duration, seed)
        .await
        .context("simulated session failed")?;

    match &report.file {
        Some(file) => println!(
            "{}: {} bytes ({} records, {} dropped)",
            report.root.join(file).display(),
            report.file_bytes,
            report.stats.enqueued,
            report.stats.dropped
        ),
        None => println!("no session file was opened"),
    }
    Ok(())
}

fn parse_file(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let (records, trailing) = decode_records::<ANALOG_CHANNELS>(&data);
    if trailing > 0 {
        warn!(trailing, "ignoring incomplete trailing record");
    }

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_csv(&records, writer).context("writing CSV")?;

    info!(records = records.len(), "converted {}", input.display());
    Ok(())
}
