use clap::{CommandFactory, Parser};
use log::{error, info};

use envdb::cli::{Cli, Commands};
use envdb::config;

fn main() {
    let cli = Cli::parse();

    // init logger
    env_logger::Builder::from_default_env()
        .filter_level(config::log_level(cli.debug, cli.dev, cli.quiet))
        .init();

    if cli.dev {
        info!("Dev mode enabled.");
    }

    let result = match &cli.command {
        Some(Commands::Server(cmd)) => cmd.execute(),
        Some(Commands::Node(cmd)) => cmd.execute(),
        Some(Commands::Users(cmd)) => cmd.execute(),
        None => {
            let mut usage = Cli::command();
            usage.print_help().map_err(Into::into)
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
