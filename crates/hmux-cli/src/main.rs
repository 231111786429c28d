use hmux_core::logging;

mod cli;

use crate::cli::CliCommand;

// The engine is single-threaded; the current-thread runtime only supplies the host tick.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("hmux error: {:#}", err);
        std::process::exit(1);
    }
}
