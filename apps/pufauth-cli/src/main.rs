use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod fleet;

#[derive(Parser)]
#[command(
    name = "pufauth",
    version,
    about = "PUF mutual-authentication demo CLI (non-production)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a local store holding protocol parameters
    Init {
        /// Path to local store directory
        #[arg(long)]
        store: PathBuf,
        /// Sub-challenge width C in bits (multiple of 8)
        #[arg(long)]
        challenge_bits: Option<usize>,
        /// Response width R in bits (multiple of 8, at least 8)
        #[arg(long)]
        response_bits: Option<usize>,
        /// Seconds a consumed identity stays valid for a tag that missed M5 (0 = delete at once)
        #[arg(long)]
        retention_secs: Option<u64>,
        /// Seconds before an unfinished reader session is dropped
        #[arg(long)]
        session_timeout_secs: Option<u64>,
    },
    /// Show local store/config status
    Status {
        /// Path to local store directory
        #[arg(long)]
        store: PathBuf,
    },
    /// Enroll simulated tags and run handshake rounds against one server
    Simulate {
        /// Read parameters from this store (defaults otherwise)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Number of tags to manufacture
        #[arg(long, default_value_t = 10)]
        tags: u64,
        /// Rounds per tag
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        /// Run all tags' rounds step-by-step side by side on distinct readers
        #[arg(long, default_value_t = false)]
        interleaved: bool,
        /// Seed for devices, enrollment and nonces
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print the wire messages of one round as hex
    Transcript {
        /// Read parameters from this store (defaults otherwise)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Seed for the device and nonces
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Init {
            store,
            challenge_bits,
            response_bits,
            retention_secs,
            session_timeout_secs,
        } => commands::init::run(
            &store,
            challenge_bits,
            response_bits,
            retention_secs,
            session_timeout_secs,
        ),
        Command::Status { store } => commands::status::run(&store),
        Command::Simulate {
            store,
            tags,
            rounds,
            interleaved,
            seed,
        } => commands::simulate::run(store.as_deref(), tags, rounds, interleaved, seed),
        Command::Transcript { store, seed } => commands::transcript::run(store.as_deref(), seed),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
