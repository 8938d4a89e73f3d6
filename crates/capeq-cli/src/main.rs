use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

use capeq_cli::cli::{Cli, Commands};

mod commands;

use crate::commands::run::RunArgs;
use crate::commands::util::configure_threads;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match cli.command {
        Commands::Run {
            scenario,
            rounds,
            strategy,
            seed,
            deadline_secs,
            out,
            threads,
        } => {
            configure_threads(&threads);
            commands::run::handle(RunArgs {
                scenario,
                rounds,
                strategy: strategy.into(),
                seed,
                deadline_secs,
                out,
            })
        }
        Commands::Validate { scenario } => commands::validate::handle(&scenario),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}
