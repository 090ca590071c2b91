//! Command-line front end for uniconv.
//!
//! Lists the format catalog and converts local files through the same
//! dispatcher a graphical front end would use.

mod commands;
mod metrics;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uniconv_core::{load_config, load_config_from_env, validate_config, Config};

/// Convert images, audio, video, 3D models and subtitles.
#[derive(Parser, Debug)]
#[command(name = "uniconv", version, about, arg_required_else_help = true)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true, env = "UNICONV_CONFIG")]
    config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the conversion categories and their formats.
    Categories {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load the media engine and report the encoders it offers.
    Engine {
        /// Print the capabilities as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the formats a file can be converted to.
    Formats {
        /// File to inspect.
        input: PathBuf,

        /// Category to use instead of detecting it from the file name.
        #[arg(long)]
        category: Option<String>,
    },

    /// Convert a file.
    Convert {
        /// File to convert.
        input: PathBuf,

        /// Target format, e.g. `mp3` or `vtt`.
        #[arg(short, long)]
        to: String,

        /// Category to use instead of detecting it from the file name.
        #[arg(long)]
        category: Option<String>,

        /// Where to write the result. Defaults to `converted.<format>`.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the final dispatcher state as JSON.
        #[arg(long)]
        json: bool,

        /// Print conversion metrics in Prometheus text format to stderr.
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = read_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;
    let catalog = config.build_catalog().context("Invalid catalog")?;

    match cli.command {
        Command::Categories { json } => commands::categories(&catalog, json),
        Command::Engine { json } => commands::engine(config, json).await,
        Command::Formats { input, category } => {
            commands::formats(&catalog, &input, category.as_deref())
        }
        Command::Convert {
            input,
            to,
            category,
            out,
            json,
            metrics,
        } => {
            let request = commands::ConvertRequest {
                input,
                target: to,
                category,
                out,
                json,
            };
            let converted = commands::convert(config, catalog, request).await;
            if metrics {
                eprint!("{}", crate::metrics::encode_metrics()?);
            }
            converted
        }
    }
}

fn read_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => load_config_from_env().context("Failed to load config from environment"),
    }
}
