//! Unreliable relay server.
//!
//! Accepts two clients and forwards every line between them, optionally
//! dropping, corrupting, delaying, reordering and duplicating messages.

use arq_relay::config::{DEFAULT_MAX_FRAME_SIZE, ImpairmentConfig, RelayConfig};
use arq_relay::relay::{self, CorruptionKind, DropTier};
use clap::{ArgAction, CommandFactory, Parser};
use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "relay",
    about = "Relays lines between two clients over an unreliable simulated link",
    after_help = "Out-of-order delivery works best with some -l latency.",
    disable_help_flag = true
)]
struct Cli {
    /// Port to listen on.
    #[arg(required_unless_present = "help")]
    port: Option<u16>,

    /// Randomly corrupt about PCT% of messages.
    #[arg(short = 'c', value_name = "PCT", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    corrupt_rate: u8,

    /// Corruption type: 1=char-flip, 2=insert-newline, 3=truncate-clean, 4=truncate-dirty.
    #[arg(short = 'C', value_name = "TYPE", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=4))]
    corruption: u8,

    /// Randomly drop messages: -d about 10%, -dd about 25%, -ddd about 50%.
    #[arg(short = 'd', action = ArgAction::Count)]
    drop: u8,

    /// Add at least MS milliseconds of latency to each message.
    #[arg(short = 'l', value_name = "MS", default_value_t = 0)]
    latency: u64,

    /// Reorder the queue after about PCT% of messages.
    #[arg(short = 'r', value_name = "PCT", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    reorder_rate: u8,

    /// Reorder step: >0 moves the newest message earlier, <0 moves an older one later, 0 is random.
    #[arg(short = 'R', value_name = "STEP", default_value_t = 0, allow_negative_numbers = true)]
    reorder_step: i32,

    /// Randomly duplicate about PCT% of messages (including duplicates).
    #[arg(short = 'x', value_name = "PCT", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    duplicate_rate: u8,

    /// Increase log verbosity (-v debug, -vv trace with queue dumps).
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Seed the random number generator for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Longest line accepted from a client, newline included.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Print help.
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_frame_size: self.max_frame_size,
            impairment: ImpairmentConfig {
                drop_tier: DropTier::from_count(self.drop),
                corrupt_rate: self.corrupt_rate,
                corruption: CorruptionKind::from_number(self.corruption)
                    .unwrap_or(CorruptionKind::CharacterFlip),
                latency: Duration::from_millis(self.latency),
                reorder_rate: self.reorder_rate,
                reorder_step: self.reorder_step,
                duplicate_rate: self.duplicate_rate,
                seed: self.seed,
            },
        }
    }
}

/// The rendered help text, printed to stderr on `-h` or a missing port.
fn usage() -> String {
    Cli::command().render_help().to_string()
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
    let port = match cli.port {
        Some(port) if !cli.help => port,
        // Asking for help is treated as a usage error.
        _ => {
            eprint!("{}", usage());
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cli.verbose);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    match relay::listen(addr, cli.relay_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Relay stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
