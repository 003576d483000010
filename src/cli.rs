//! Command-line interface built on clap.
//!
//! [`Cli`] holds the global flags (--server, --interval-ms, --verbose) and the
//! [`Command`] subcommands (generate, submit, params).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// partgen: generate printer evaluation parts on a remote server.
#[derive(Debug, Parser)]
#[command(name = "partgen", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the generation server (overrides partgen.toml).
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Interval between status checks in milliseconds.
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a generation job and wait for the part.
    Generate {
        /// Parameters as a query string, e.g. "layer_height=0.2&col_min=0.3".
        query: Option<String>,

        #[arg(long)]
        layer_height: Option<f64>,

        #[arg(long)]
        col_min: Option<f64>,

        #[arg(long)]
        col_max: Option<f64>,

        #[arg(long)]
        bar_min: Option<f64>,

        #[arg(long)]
        bar_max: Option<f64>,

        /// JSON parameter catalogue providing default values.
        #[arg(long)]
        catalogue: Option<PathBuf>,

        /// Directory where the finished part is saved (default: current directory).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Only print the download link.
        #[arg(long, default_value_t = false)]
        no_download: bool,

        /// Print a JSON report when the job ends.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Submit results and form data to the server.
    Submit {
        /// Form fields as a query string, e.g. "name=Ada&printer=mk3".
        query: String,
    },

    /// List a parameter catalogue in display order.
    Params {
        /// JSON parameter catalogue.
        #[arg(long)]
        catalogue: PathBuf,

        /// Values to show instead of the catalogue defaults.
        query: Option<String>,
    },
}
