mod commands;
mod terminal;

use std::time::Duration;

use commands::{CommandLine, Commands, inventory, run};
use fleetr_common::config::Config;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet);

    let mut cfg = Config {
        no_banner: commands.no_banner,
        quiet: commands.quiet,
        ..Config::default()
    };
    print::banner(cfg.no_banner, cfg.quiet);

    match commands.command {
        Commands::Inventory(args) => {
            cfg.no_vendors = args.no_vendors;
            print::header("loading inventory", cfg.quiet);
            inventory::inventory(args, &cfg).await
        }
        Commands::Run(args) => {
            cfg.no_vendors = args.inventory.no_vendors;
            cfg.delay = Duration::from_secs(args.delay);
            cfg.snapshot = args.snapshot.clone();
            run::run(args, &cfg).await
        }
    }
}
