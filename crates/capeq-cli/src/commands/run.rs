use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use capeq_algo::{Interrupt, Strategy};
use capeq_cli::report::RunReport;
use capeq_cli::scenario::Scenario;
use tracing::{info, warn};

use crate::commands::util::{deadline, install_sigint, spawn_deadline};

pub struct RunArgs {
    pub scenario: PathBuf,
    pub rounds: Option<usize>,
    pub strategy: Strategy,
    pub seed: Option<u64>,
    pub deadline_secs: Option<f64>,
    pub out: Option<PathBuf>,
}

pub fn handle(args: RunArgs) -> Result<()> {
    let budget = args.deadline_secs.map(deadline).transpose()?;
    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(seed) = args.seed {
        scenario.settings.seed = Some(seed);
    }
    for warning in scenario.warnings() {
        warn!("{warning}");
    }
    let rounds = args.rounds.unwrap_or(scenario.rounds);

    let mut solver = scenario
        .build_solver()
        .context("building solver from scenario")?;
    solver.select_strategy(args.strategy == Strategy::Gradient);

    let interrupt = Interrupt::new();
    install_sigint(&interrupt);
    if let Some(delay) = budget {
        spawn_deadline(&interrupt, delay);
    }

    info!(
        agents = solver.num_agents(),
        devices = solver.num_devices(),
        rounds,
        strategy = %args.strategy,
        "starting diagonalization"
    );
    let result = match args.strategy {
        Strategy::Grid => solver.iterate_brute_force(rounds, &interrupt),
        Strategy::Evolutionary | Strategy::Gradient => solver.iterate(rounds, &interrupt),
    };

    let interrupted = match result {
        Ok(_) => false,
        Err(err) if err.is_interrupt() => {
            warn!("{err}; writing partial report");
            true
        }
        Err(err) => return Err(err).context("running diagonalization"),
    };

    let report = RunReport::from_solver(
        &solver,
        &scenario.agent_names(),
        args.strategy,
        rounds,
        interrupted,
    );
    let json = serde_json::to_string_pretty(&report).context("serializing report")?;

    match &args.out {
        Some(path) => {
            write_report(path, &json)?;
            print_summary(&report, path);
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn write_report(path: &Path, json: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("creating report file: {}", path.display()))?;
    file.write_all(json.as_bytes()).context("writing report")?;
    Ok(())
}

fn print_summary(report: &RunReport, path: &Path) {
    println!("Diagonalization finished:");
    println!(
        "  Rounds: {}/{}{}",
        report.rounds_completed,
        report.rounds_requested,
        if report.interrupted { " (interrupted)" } else { "" }
    );
    println!("  Total capacity: {:.3e}", report.total_capacity);
    for agent in &report.agents {
        println!("  {}: {:?}", agent.name, agent.final_capacity);
    }
    if report.diagnostics.has_issues() {
        println!("  {}", report.diagnostics.summary());
    }
    println!("\nReport written to {}", path.display());
}
