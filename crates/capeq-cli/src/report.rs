//! JSON report written at the end of `capeq run`.

use capeq_algo::{AgentHistory, DiagonalizedSolver, RoundReport, Strategy};
use capeq_core::Diagnostics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub name: String,
    pub final_capacity: Vec<f64>,
    pub history: AgentHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: Strategy,
    pub seed: Option<u64>,
    pub rounds_requested: usize,
    pub rounds_completed: usize,
    /// True when the run stopped on SIGINT or the deadline
    pub interrupted: bool,
    pub devices: Vec<String>,
    pub total_capacity: f64,
    pub agents: Vec<AgentReport>,
    pub rounds: Vec<RoundReport>,
    /// All round diagnostics merged
    pub diagnostics: Diagnostics,
}

impl RunReport {
    pub fn from_solver(
        solver: &DiagonalizedSolver,
        agent_names: &[String],
        strategy: Strategy,
        rounds_requested: usize,
        interrupted: bool,
    ) -> Self {
        let agents = solver
            .histories()
            .iter()
            .enumerate()
            .map(|(i, history)| AgentReport {
                name: agent_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("agent_{i}")),
                final_capacity: solver.capacity().row(i).to_vec(),
                history: history.clone(),
            })
            .collect();

        let mut diagnostics = Diagnostics::new();
        for round in solver.rounds() {
            diagnostics.merge(round.diagnostics.clone());
        }

        Self {
            strategy,
            seed: solver.settings().seed,
            rounds_requested,
            rounds_completed: solver.iteration_count(),
            interrupted,
            devices: solver.device_names().to_vec(),
            total_capacity: solver.total_capacity(),
            agents,
            rounds: solver.rounds().to_vec(),
            diagnostics,
        }
    }

    /// Aggregate capacity after each completed round.
    pub fn totals(&self) -> Vec<f64> {
        self.rounds.iter().map(|r| r.total_capacity).collect()
    }
}
