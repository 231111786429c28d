//! CLI for the hmux transfer engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hmux_core::config;
use hmux_core::Method;

use commands::{run_config, run_fetch, FetchArgs};

/// Top-level CLI for hmux.
#[derive(Debug, Parser)]
#[command(name = "hmux")]
#[command(about = "hmux: concurrent HTTP transfers over one curl multi handle", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch one or more URLs concurrently and print each result as it completes.
    Fetch {
        /// HTTP/HTTPS URLs; one transfer per URL.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Request method: GET, POST, PUT or DELETE.
        #[arg(short = 'X', long, default_value = "GET")]
        method: Method,

        /// Raw header line ("Name: Value"); repeatable, sent in the given order.
        #[arg(short = 'H', long = "header", value_name = "LINE")]
        headers: Vec<String>,

        /// Request body sent with every transfer.
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Total timeout per transfer (default from config).
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Interval between poll steps.
        #[arg(long, default_value = "10", value_name = "MS")]
        tick_ms: u64,

        /// Print the response body after each summary line.
        #[arg(short = 'i', long)]
        include_body: bool,

        /// Print one JSON object per completed transfer instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                urls,
                method,
                headers,
                data,
                timeout_ms,
                tick_ms,
                include_body,
                json,
            } => {
                let args = FetchArgs {
                    urls,
                    method,
                    headers,
                    body: data.map(String::into_bytes).unwrap_or_default(),
                    timeout_ms,
                    tick_ms,
                    include_body,
                    json,
                };
                run_fetch(&cfg, args).await?;
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
