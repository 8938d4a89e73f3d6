use std::path::Path;

use anyhow::{Context, Result};
use capeq_cli::scenario::Scenario;

pub fn handle(scenario_path: &Path) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let solver = scenario
        .build_solver()
        .context("checking scenario dimensions")?;

    println!("Scenario is valid");
    println!(
        "  {} agent(s), {} device type(s), {} node(s)",
        solver.num_agents(),
        solver.num_devices(),
        solver.nodes().len()
    );
    println!("  Devices: {}", scenario.devices.join(", "));
    for warning in scenario.warnings() {
        println!("  Warning: {warning}");
    }
    Ok(())
}
