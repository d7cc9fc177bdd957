pub mod commands;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser)]
#[command(name = "unitool", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: commands::Commands,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Emit log events as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}
