//! Per-agent best-response optimizers.
//!
//! Each round, every agent solves
//!
//! ```text
//! maximize profit_i(x_i; x_other)   subject to   x_i ∈ [lower, upper]
//! ```
//!
//! holding all competitors' capacities fixed. Three interchangeable
//! strategies implement [`BestResponse`]:
//!
//! | Strategy | Search | Objective convention |
//! |----------|--------|----------------------|
//! | [`EvolutionarySearch`] | Differential evolution, multi-start | minimizes net cost, reports the negated value (profit) |
//! | [`GridSearch`] | Exhaustive fixed-step grid | minimizes net cost, reports it as is |
//! | [`GradientSearch`] | Penalty L-BFGS with analytic gradient, multi-start | minimizes summed surrogate output in normalized space |
//!
//! None of them guarantees a global optimum of the non-convex subproblem.
//! Randomized strategies are reproducible only when a seed is supplied.

mod evolution;
mod gradient;
mod grid;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use capeq_core::{AgentMatrix, CapeqError, CapeqResult, DataScale, NodeBounds, SurrogateSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::interrupt::Interrupt;
use crate::objective::{AgentObjective, Regularization};
use crate::region::RegionInputs;

pub use evolution::{EvolutionConfig, EvolutionarySearch};
pub use gradient::{GradientConfig, GradientSearch};
pub use grid::{GridConfig, GridSearch};

/// Everything one agent's best response depends on.
#[derive(Debug, Clone, Copy)]
pub struct AgentProblem<'a> {
    /// Current capacity matrix (competitors' rows are held fixed)
    pub capacity: &'a AgentMatrix,
    pub agent: usize,
    pub nodes: &'a NodeBounds,
    /// Agent's capital cost row
    pub costs: &'a [f64],
    /// Agent's capacity limit row
    pub limits: &'a [f64],
    /// Completed rounds so far
    pub iteration_count: usize,
    /// Max growth per device per round (`f64::INFINITY` for none)
    pub action_increment: f64,
    pub models: &'a SurrogateSet,
    pub regularization: Option<&'a Regularization>,
    pub scale: &'a DataScale,
    /// Raise on degenerate bounds instead of clamping
    pub strict_bounds: bool,
    /// Base seed for randomized strategies
    pub seed: Option<u64>,
}

impl<'a> AgentProblem<'a> {
    pub fn region_inputs(&self) -> RegionInputs<'a> {
        RegionInputs {
            nodes: self.nodes,
            capacity: self.capacity,
            agent: self.agent,
            limits: self.limits,
            action_increment: self.action_increment,
            strict: self.strict_bounds,
        }
    }

    /// Agent's own current decision (the regularization anchor).
    pub fn current(&self) -> &'a [f64] {
        self.capacity.row(self.agent)
    }

    pub fn objective<'b>(&'b self, x_other: &'b [f64]) -> AgentObjective<'b> {
        AgentObjective {
            x_prev: self.current(),
            x_other,
            costs: self.costs,
            models: self.models,
            regularization: self.regularization,
        }
    }

    /// RNG for restart `restart`; OS entropy when no seed was given.
    pub fn rng(&self, restart: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                StdRng::seed_from_u64(derive_seed(seed, self.iteration_count, self.agent, restart))
            }
            None => StdRng::from_entropy(),
        }
    }

    pub(crate) fn check_interrupt(&self, interrupt: &Interrupt) -> CapeqResult<()> {
        if interrupt.is_triggered() {
            return Err(CapeqError::Interrupted {
                round: self.iteration_count,
                agents_completed: self.agent,
            });
        }
        Ok(())
    }
}

/// Mix the base seed with round, agent and restart so that every
/// sub-search draws an independent but reproducible stream.
pub fn derive_seed(seed: u64, round: usize, agent: usize, restart: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    (seed, round, agent, restart).hash(&mut hasher);
    hasher.finish()
}

/// Result of one agent's best response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    /// New capacity row, in raw units
    pub decision: Vec<f64>,
    /// Objective value under the strategy's reporting convention
    pub objective: f64,
    /// False when the search ran out of budget (best point so far returned)
    pub converged: bool,
    /// Objective evaluations spent
    pub evaluations: usize,
    /// Devices whose feasible interval collapsed to zero width
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub saturated: Vec<usize>,
}

/// A per-agent optimization strategy.
pub trait BestResponse: Send + Sync {
    /// Unique identifier (e.g., "evolutionary", "grid", "gradient")
    fn id(&self) -> &str;

    fn optimize(&self, problem: &AgentProblem<'_>, interrupt: &Interrupt)
        -> CapeqResult<AgentDecision>;
}

/// Strategy selector used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Evolutionary,
    Gradient,
    Grid,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Evolutionary => "evolutionary",
            Strategy::Gradient => "gradient",
            Strategy::Grid => "grid",
        };
        f.write_str(name)
    }
}
