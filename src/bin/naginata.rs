//! Naginata CLI binary.

use std::process;

use clap::Parser;
use naginata::cli::{args::NaginataArgs, commands::execute_command};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = NaginataArgs::parse();

    // Verbosity maps to the tracing level unless RUST_LOG overrides it.
    let default_level = match args.verbosity() {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
