//! FWMFW - Firewall Me From Within
//!
//! Blocks network access for the executables named in a block list by
//! creating one inbound and one outbound blocking rule per executable, and
//! removes the rules of executables no longer listed.
//!
//! # Usage
//!
//! ```bash
//! fwmfw blocklist.txt                         # Reconcile the Windows Firewall
//! fwmfw blocklist.txt --dry-run               # Show what would change
//! fwmfw blocklist.txt --store-file rules.json # Reconcile a JSON rule file
//! ```
//!
//! # Exit codes
//!
//! - `0`: every change succeeded
//! - `-1`: the run failed or at least one rule pair could not be changed
//! - `-2`: the block-list argument is missing

use clap::Parser;
use fwmfw::cli::{self, Cli};
use fwmfw::config;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match cli::usage_exit_code(&e) {
            Some(code) => {
                eprint!("{}", cli::MISSING_ARGUMENT_USAGE);
                std::process::exit(code);
            }
            None => e.exit(),
        },
    };

    init_logging(cli.verbose);

    let config = config::load_config();
    let result = cli::run(
        &cli,
        &config,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    );
    let code = cli::finish(result, &mut std::io::stderr().lock());
    // Every store handle and the session have been dropped by now
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
