pub mod inventory;
pub mod run;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleetr")]
#[command(about = "Keeps a remote IP assignment store in sync with a device fleet.")]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Reduce output, repeat for less (-qq only prints summaries)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// Print debug events
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide the startup banner
    #[arg(long, global = true)]
    pub no_banner: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the assignment store until interrupted
    #[command(alias = "r")]
    Run(RunArgs),
    /// Load and merge inventory records, then print the devices
    #[command(alias = "i")]
    Inventory(InventoryArgs),
}

#[derive(Args)]
pub struct InventoryArgs {
    /// JSON device record exports, one per source
    #[arg(long = "inventory", short = 'i', required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Skip the MAC vendor lookup
    #[arg(long)]
    pub no_vendors: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub inventory: InventoryArgs,

    /// JSON file listing the current device to address bindings
    #[arg(long, short = 'b', env = "FLEETR_BINDINGS")]
    pub bindings: PathBuf,

    /// Seconds to wait between two cycles
    #[arg(long, short = 'd', env = "FLEETR_DELAY", default_value_t = 60)]
    pub delay: u64,

    /// Assignment cache written on exit and restored on start
    #[arg(long, short = 's', env = "FLEETR_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
