//! Command-line interface parsing for fxquote
//!
//! This module handles parsing of CLI arguments using clap and folding the
//! flags over the loaded configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// fxquote - Serve a cached USD/BRL quote under a strict latency budget
#[derive(Parser, Debug)]
#[command(name = "fxquote")]
#[command(about = "USD/BRL quote server, bounded client and mock upstream")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./fxquote.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the quote server (GET /quote)
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch one quote from the server and append it to the output file
    ///
    /// Examples:
    ///   fxquote fetch
    ///   fxquote fetch --timeout-ms 500 --output quotes.txt
    Fetch {
        /// Quote server URL
        #[arg(long)]
        url: Option<String>,
        /// Give up after this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// File to append `<timestamp>\t<bidPrice>` lines to
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Run a mock upstream that answers after a delay
    Mock {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
        /// Reply delay in milliseconds
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,
    },
}

impl Command {
    /// Overrides configuration values with the flags given on the command line
    pub fn apply_to(&self, config: &mut Config) {
        match self {
            Command::Serve { port } => {
                if let Some(port) = port {
                    config.server.port = *port;
                }
            }
            Command::Fetch {
                url,
                timeout_ms,
                output,
            } => {
                if let Some(url) = url {
                    config.client.url = url.clone();
                }
                if let Some(ms) = timeout_ms {
                    config.client.timeout_ms = *ms;
                }
                if let Some(output) = output {
                    config.client.output = output.clone();
                }
            }
            Command::Mock { port, delay_ms } => {
                if let Some(port) = port {
                    config.mock.port = *port;
                }
                if let Some(ms) = delay_ms {
                    config.mock.delay_ms = *ms;
                }
            }
        }
    }
}
