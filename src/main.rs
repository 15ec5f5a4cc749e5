//! fxquote - Serve a cached USD/BRL quote under a strict latency budget
//!
//! `serve` runs the quote server, `fetch` is the bounded client and `mock`
//! stands in for the upstream provider.

use clap::Parser;
use tracing::{error, warn};

use fxquote::cli::{Cli, Command};
use fxquote::config::Config;
use fxquote::error::Error;
use fxquote::{client, mock, server};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.logging.init();

    let result = match cli.command {
        Command::Serve { .. } => server::serve(&config).await,
        Command::Fetch { .. } => client::fetch_and_record(&config.client).await.map(|_| ()),
        Command::Mock { .. } => mock::serve(&config.mock).await,
    };

    match result {
        Ok(()) => {}
        Err(Error::Timeout) => {
            warn!("Error: timed out waiting for quote");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.command.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}
