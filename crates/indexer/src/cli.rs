//! Argument parsing. Grounded on `original_source/indexer.py`'s argparse
//! setup and on `zjj`'s minimal-feature `clap` usage (derive API, no
//! unneeded feature surface).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "artwork-indexer", about = "Syncs catalog artwork with the remote archive")]
pub struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, default_value = "config.ini")]
    pub config: PathBuf,

    /// Upper bound, in seconds, on the idle-poll backoff.
    #[arg(long, default_value_t = 32)]
    pub max_wait: u64,

    /// Exit after this many consecutive idle polls. Unset runs forever.
    #[arg(long)]
    pub max_idle_loops: Option<u64>,

    /// Install the event-queue schema and trigger protocol, then exit.
    #[arg(long)]
    pub setup_schema: bool,

    /// Raise log verbosity to debug.
    #[arg(long)]
    pub debug: bool,
}
