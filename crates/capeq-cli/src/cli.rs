use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Approximate capacity-investment equilibria", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run diagonalization rounds on a scenario
    Run {
        /// Scenario file (TOML)
        #[arg(long, value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Number of rounds (overrides the scenario)
        #[arg(long)]
        rounds: Option<usize>,
        /// Per-agent optimizer
        #[arg(long, value_enum, default_value_t = StrategyArg::Evolutionary)]
        strategy: StrategyArg,
        /// Random seed (overrides the scenario)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop at the next agent boundary after this many seconds
        #[arg(long)]
        deadline_secs: Option<f64>,
        /// Write the JSON report here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Threading hint (auto or integer)
        #[arg(long, default_value = "auto")]
        threads: String,
    },
    /// Check a scenario file without running it
    Validate {
        /// Scenario file (TOML)
        #[arg(long, value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    /// Differential evolution (default)
    Evolutionary,
    /// Penalty L-BFGS on the surrogate gradient
    Gradient,
    /// Exhaustive grid search
    Grid,
}

impl From<StrategyArg> for capeq_algo::Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Evolutionary => capeq_algo::Strategy::Evolutionary,
            StrategyArg::Gradient => capeq_algo::Strategy::Gradient,
            StrategyArg::Grid => capeq_algo::Strategy::Grid,
        }
    }
}
