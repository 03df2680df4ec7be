//! Reliable-delivery client.
//!
//! Sends every line typed on stdin to the peer behind the relay and prints
//! every line the peer sends, in order and exactly once. Type `quit` to exit.

use arq_relay::client;
use arq_relay::config::ArqConfig;
use clap::{ArgAction, Parser};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "client", about = "Reliable line delivery over an unreliable relay")]
struct Cli {
    /// IP address of the relay.
    server_ip: String,

    /// Port of the relay.
    port: u16,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match client::server_addr(&cli.server_ip, cli.port) {
        Ok(addr) => client::connect(addr, ArqConfig::default()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
