//! Gauss-Seidel diagonalization over agents' best responses.
//!
//! The solver owns the capacity matrix and every agent's history. One round
//! visits agents `0..num_agents` in order; each agent's new row is written
//! into the matrix before the next agent optimizes, so later agents see
//! earlier agents' updates from the same round.
//!
//! ```text
//! Initialized ──step()──▶ Running ──step()──▶ Running ...
//!      ▲                                          │
//!      └───────────────── reset() ◀───────────────┘
//! ```
//!
//! An interrupted or failed round keeps the rows (and history entries) of
//! agents that finished before the failure and does not advance the
//! iteration count.

use capeq_core::{
    AgentMatrix, CapeqError, CapeqResult, DataScale, Diagnostics, NodeBounds, SurrogateSet,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::history::{AgentHistory, HistoryEntry, RoundReport};
use crate::interrupt::Interrupt;
use crate::objective::Regularization;
use crate::optimizer::{
    AgentProblem, BestResponse, EvolutionConfig, EvolutionarySearch, GradientConfig,
    GradientSearch, GridConfig, GridSearch, Strategy,
};

/// Solver-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SolverSettings {
    /// Per-round growth cap on each device; `None` means unbounded
    pub action_increment: Option<f64>,
    /// Damping toward the agent's previous decision; off when `None`
    pub regularization: Option<Regularization>,
    /// Base seed for the randomized strategies; OS entropy when `None`
    pub seed: Option<u64>,
    /// Fail on collapsed feasible intervals instead of clamping them
    pub strict_bounds: bool,
    pub evolutionary: EvolutionConfig,
    pub gradient: GradientConfig,
    pub grid: GridConfig,
}

impl SolverSettings {
    /// Reject bad settings, including per-device vectors whose length
    /// differs from `num_devices`.
    pub fn validate(&self, num_devices: usize) -> CapeqResult<()> {
        if let Some(inc) = self.action_increment {
            if !(inc >= 0.0) {
                return Err(CapeqError::Config(format!(
                    "action_increment must be non-negative, got {inc}"
                )));
            }
        }
        if let Some(reg) = &self.regularization {
            if !(reg.alpha >= 0.0) || !reg.alpha.is_finite() {
                return Err(CapeqError::Config(format!(
                    "regularization alpha must be non-negative and finite, got {}",
                    reg.alpha
                )));
            }
        }
        let evo = &self.evolutionary;
        if evo.popsize == 0 || !(evo.mutation >= 0.0) || !(0.0..=1.0).contains(&evo.recombination)
        {
            return Err(CapeqError::Config(
                "evolutionary popsize must be positive, mutation non-negative \
                 and recombination within [0, 1]"
                    .into(),
            ));
        }
        self.gradient.validate(num_devices)?;
        self.grid.validate(num_devices)?;
        Ok(())
    }

    fn increment(&self) -> f64 {
        self.action_increment.unwrap_or(f64::INFINITY)
    }
}

/// Diagonalization solver state.
#[derive(Debug, Clone)]
pub struct DiagonalizedSolver {
    capital_costs: AgentMatrix,
    limits: AgentMatrix,
    nodes: NodeBounds,
    models: SurrogateSet,
    device_names: Vec<String>,
    scale: DataScale,
    settings: SolverSettings,
    strategy: Strategy,

    capacity: AgentMatrix,
    histories: Vec<AgentHistory>,
    iteration_count: usize,
    rounds: Vec<RoundReport>,
}

impl DiagonalizedSolver {
    /// Build a solver in the initialized state.
    ///
    /// Every input shape is checked here so that no round fails on a
    /// dimension error halfway through.
    pub fn new(
        capital_costs: AgentMatrix,
        limits: AgentMatrix,
        nodes: NodeBounds,
        models: SurrogateSet,
        settings: SolverSettings,
    ) -> CapeqResult<Self> {
        let (num_agents, num_devices) = capital_costs.shape();
        if num_agents == 0 || num_devices == 0 {
            return Err(CapeqError::Config(
                "at least one agent and one device type are required".into(),
            ));
        }
        limits.ensure_shape("capacity limits", num_agents, num_devices)?;
        nodes.validate(num_devices)?;
        if models.len() != num_devices {
            return Err(CapeqError::shape("surrogate set", num_devices, models.len()));
        }
        settings.validate(num_devices)?;

        Ok(Self {
            capital_costs,
            limits,
            nodes,
            models,
            device_names: (0..num_devices).map(|j| format!("device_{j}")).collect(),
            scale: DataScale::identity(),
            settings,
            strategy: Strategy::Evolutionary,
            capacity: AgentMatrix::zeros(num_agents, num_devices),
            histories: vec![AgentHistory::new(); num_agents],
            iteration_count: 0,
            rounds: Vec::new(),
        })
    }

    pub fn with_device_names(mut self, names: Vec<String>) -> CapeqResult<Self> {
        if names.len() != self.num_devices() {
            return Err(CapeqError::shape("device names", self.num_devices(), names.len()));
        }
        self.device_names = names;
        Ok(self)
    }

    /// Capacity scale used by the gradient strategy.
    pub fn with_scale(mut self, scale: DataScale) -> CapeqResult<Self> {
        scale.validate()?;
        self.scale = scale;
        Ok(self)
    }

    /// Back to the initialized state: zero capacity, empty histories.
    pub fn reset(&mut self) {
        let (agents, devices) = self.capacity.shape();
        self.capacity = AgentMatrix::zeros(agents, devices);
        self.histories.iter_mut().for_each(AgentHistory::clear);
        self.iteration_count = 0;
        self.rounds.clear();
    }

    /// Warm-start from a given capacity matrix. History is left untouched.
    pub fn set_starting_capacity(&mut self, capacity: AgentMatrix) -> CapeqResult<()> {
        capacity.ensure_shape("starting capacity", self.num_agents(), self.num_devices())?;
        if !capacity.is_non_negative() {
            return Err(CapeqError::Config(
                "starting capacity must be non-negative and finite".into(),
            ));
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Toggle between gradient search and the default evolutionary search.
    /// Grid search is only reachable through [`Self::step_brute_force`].
    pub fn select_strategy(&mut self, gradient_based: bool) {
        self.strategy = if gradient_based {
            Strategy::Gradient
        } else {
            Strategy::Evolutionary
        };
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// One round with the selected strategy.
    pub fn step(&mut self, interrupt: &Interrupt) -> CapeqResult<RoundReport> {
        match self.strategy {
            Strategy::Gradient => {
                let search = GradientSearch::new(self.settings.gradient.clone());
                self.run_round(&search, interrupt)
            }
            // `select_strategy` never stores Grid
            Strategy::Evolutionary | Strategy::Grid => {
                let search = EvolutionarySearch::new(self.settings.evolutionary.clone());
                self.run_round(&search, interrupt)
            }
        }
    }

    /// One round of exhaustive grid search.
    pub fn step_brute_force(&mut self, interrupt: &Interrupt) -> CapeqResult<RoundReport> {
        let search = GridSearch::new(self.settings.grid.clone());
        self.run_round(&search, interrupt)
    }

    /// `num_rounds` rounds with the selected strategy, logging the aggregate
    /// capacity after each.
    pub fn iterate(
        &mut self,
        num_rounds: usize,
        interrupt: &Interrupt,
    ) -> CapeqResult<Vec<RoundReport>> {
        self.iterate_with(num_rounds, interrupt, Self::step)
    }

    /// Like [`Self::iterate`] but every round uses grid search.
    pub fn iterate_brute_force(
        &mut self,
        num_rounds: usize,
        interrupt: &Interrupt,
    ) -> CapeqResult<Vec<RoundReport>> {
        self.iterate_with(num_rounds, interrupt, Self::step_brute_force)
    }

    fn iterate_with(
        &mut self,
        num_rounds: usize,
        interrupt: &Interrupt,
        step: fn(&mut Self, &Interrupt) -> CapeqResult<RoundReport>,
    ) -> CapeqResult<Vec<RoundReport>> {
        let mut reports = Vec::with_capacity(num_rounds);
        for n in 0..num_rounds {
            let report = step(self, interrupt)?;
            info!(
                "round {}/{}, total capacity = {:.3e}",
                n + 1,
                num_rounds,
                report.total_capacity
            );
            reports.push(report);
        }
        Ok(reports)
    }

    fn run_round(
        &mut self,
        optimizer: &dyn BestResponse,
        interrupt: &Interrupt,
    ) -> CapeqResult<RoundReport> {
        let start = Instant::now();
        let round = self.iteration_count;
        let increment = self.settings.increment();
        let mut objectives = Vec::with_capacity(self.num_agents());
        let mut diagnostics = Diagnostics::new();

        for agent in 0..self.num_agents() {
            if interrupt.is_triggered() {
                warn!(round, agent, "round interrupted");
                return Err(CapeqError::Interrupted {
                    round,
                    agents_completed: agent,
                });
            }

            let problem = AgentProblem {
                capacity: &self.capacity,
                agent,
                nodes: &self.nodes,
                costs: self.capital_costs.row(agent),
                limits: self.limits.row(agent),
                iteration_count: round,
                action_increment: increment,
                models: &self.models,
                regularization: self.settings.regularization.as_ref(),
                scale: &self.scale,
                strict_bounds: self.settings.strict_bounds,
                seed: self.settings.seed,
            };
            let decision = optimizer
                .optimize(&problem, interrupt)
                .map_err(|err| err.for_agent(agent, round))?;

            debug!(
                agent,
                strategy = optimizer.id(),
                objective = decision.objective,
                evaluations = decision.evaluations,
                "best response"
            );
            if !decision.converged {
                warn!(agent, round, strategy = optimizer.id(), "best response did not converge");
                diagnostics.add_agent_warning(
                    "convergence",
                    &format!("{} search returned its best point without converging", optimizer.id()),
                    agent,
                    round,
                );
            }
            for &device in &decision.saturated {
                diagnostics.add_agent_warning(
                    "saturation",
                    &format!("{} has no room left this round", self.device_names[device]),
                    agent,
                    round,
                );
            }

            self.capacity
                .set_row(agent, &decision.decision)
                .map_err(|err| err.for_agent(agent, round))?;
            self.histories[agent].push(HistoryEntry::from(&decision));
            objectives.push(decision.objective);
        }

        self.iteration_count += 1;
        let report = RoundReport {
            round: self.iteration_count,
            total_capacity: self.capacity.total(),
            objectives,
            diagnostics,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        self.rounds.push(report.clone());
        Ok(report)
    }

    /// Stacked decisions (entries × devices) for every agent.
    ///
    /// After an aborted round, agents that finished before the abort hold one
    /// more entry than the others, so index `k` is not guaranteed to be round
    /// `k` for every agent.
    pub fn agent_decisions(&self) -> Vec<Vec<Vec<f64>>> {
        self.histories.iter().map(AgentHistory::decisions).collect()
    }

    pub fn agent_objectives(&self) -> Vec<Vec<f64>> {
        self.histories.iter().map(AgentHistory::objectives).collect()
    }

    pub fn history(&self, agent: usize) -> Option<&AgentHistory> {
        self.histories.get(agent)
    }

    pub fn histories(&self) -> &[AgentHistory] {
        &self.histories
    }

    pub fn capacity(&self) -> &AgentMatrix {
        &self.capacity
    }

    pub fn capital_costs(&self) -> &AgentMatrix {
        &self.capital_costs
    }

    pub fn limits(&self) -> &AgentMatrix {
        &self.limits
    }

    pub fn nodes(&self) -> &NodeBounds {
        &self.nodes
    }

    pub fn total_capacity(&self) -> f64 {
        self.capacity.total()
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn rounds(&self) -> &[RoundReport] {
        &self.rounds
    }

    pub fn device_names(&self) -> &[String] {
        &self.device_names
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn num_agents(&self) -> usize {
        self.capacity.num_agents()
    }

    pub fn num_devices(&self) -> usize {
        self.capacity.num_devices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capeq_core::LinearSurrogate;

    fn solver(settings: SolverSettings) -> DiagonalizedSolver {
        DiagonalizedSolver::new(
            AgentMatrix::filled(2, 2, 1.0),
            AgentMatrix::filled(2, 2, 10.0),
            NodeBounds::single(vec![0.0, 0.0], vec![10.0, 10.0]),
            SurrogateSet::from_models(vec![LinearSurrogate::sum(2), LinearSurrogate::sum(2)]),
            settings,
        )
        .unwrap()
    }

    fn fast_settings() -> SolverSettings {
        SolverSettings {
            seed: Some(42),
            evolutionary: EvolutionConfig {
                popsize: 10,
                max_generations: 50,
                restarts: 1,
                ..EvolutionConfig::default()
            },
            grid: GridConfig {
                steps: Some(vec![2.0, 2.0]),
                ..GridConfig::default()
            },
            ..SolverSettings::default()
        }
    }

    #[test]
    fn test_rejects_mismatched_limits() {
        let err = DiagonalizedSolver::new(
            AgentMatrix::filled(2, 2, 1.0),
            AgentMatrix::filled(3, 2, 10.0),
            NodeBounds::single(vec![0.0, 0.0], vec![10.0, 10.0]),
            SurrogateSet::from_models(vec![LinearSurrogate::sum(2), LinearSurrogate::sum(2)]),
            SolverSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CapeqError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_wrong_model_count() {
        let err = DiagonalizedSolver::new(
            AgentMatrix::filled(2, 2, 1.0),
            AgentMatrix::filled(2, 2, 10.0),
            NodeBounds::single(vec![0.0, 0.0], vec![10.0, 10.0]),
            SurrogateSet::from_models(vec![LinearSurrogate::sum(2)]),
            SolverSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CapeqError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_negative_increment() {
        let settings = SolverSettings {
            action_increment: Some(-1.0),
            ..SolverSettings::default()
        };
        assert!(settings.validate(2).is_err());
    }

    #[test]
    fn test_rejects_mismatched_grid_steps_at_construction() {
        let settings = SolverSettings {
            grid: GridConfig {
                steps: Some(vec![1.0, 1.0, 1.0]),
                ..GridConfig::default()
            },
            ..SolverSettings::default()
        };
        let err = DiagonalizedSolver::new(
            AgentMatrix::filled(2, 2, 1.0),
            AgentMatrix::filled(2, 2, 10.0),
            NodeBounds::single(vec![0.0, 0.0], vec![10.0, 10.0]),
            SurrogateSet::from_models(vec![LinearSurrogate::sum(2), LinearSurrogate::sum(2)]),
            settings,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CapeqError::ShapeMismatch { expected: 2, actual: 3, .. }
        ));
    }

    #[test]
    fn test_rejects_mismatched_gradient_starts() {
        let settings = SolverSettings {
            gradient: GradientConfig {
                zero_start_scale: Some(vec![1.0]),
                ..GradientConfig::default()
            },
            ..SolverSettings::default()
        };
        assert!(matches!(
            settings.validate(2),
            Err(CapeqError::ShapeMismatch { .. })
        ));
        assert!(SolverSettings::default().validate(2).is_ok());
    }

    #[test]
    fn test_default_settings_run_brute_force_on_any_width() {
        let mut s = solver(SolverSettings {
            seed: Some(1),
            ..SolverSettings::default()
        });
        let report = s.step_brute_force(&Interrupt::new()).unwrap();
        assert_eq!(report.round, 1);
    }

    #[test]
    fn test_select_strategy_toggles() {
        let mut s = solver(fast_settings());
        assert_eq!(s.strategy(), Strategy::Evolutionary);
        s.select_strategy(true);
        assert_eq!(s.strategy(), Strategy::Gradient);
        s.select_strategy(false);
        assert_eq!(s.strategy(), Strategy::Evolutionary);
    }

    #[test]
    fn test_step_advances_and_records() {
        let mut s = solver(fast_settings());
        let report = s.step(&Interrupt::new()).unwrap();
        assert_eq!(report.round, 1);
        assert_eq!(s.iteration_count(), 1);
        assert_eq!(report.objectives.len(), 2);
        assert!(s.histories().iter().all(|h| h.len() == 1));
        assert_eq!(s.rounds().len(), 1);
    }

    #[test]
    fn test_triggered_interrupt_aborts_before_first_agent() {
        let mut s = solver(fast_settings());
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let err = s.step(&interrupt).unwrap_err();
        assert!(matches!(
            err,
            CapeqError::Interrupted {
                round: 0,
                agents_completed: 0
            }
        ));
        assert_eq!(s.iteration_count(), 0);
        assert!(s.histories().iter().all(AgentHistory::is_empty));
    }

    #[test]
    fn test_set_starting_capacity_checks_shape() {
        let mut s = solver(fast_settings());
        assert!(s.set_starting_capacity(AgentMatrix::zeros(1, 2)).is_err());
        let start = AgentMatrix::filled(2, 2, 0.5);
        s.set_starting_capacity(start.clone()).unwrap();
        assert_eq!(s.capacity(), &start);
    }

    #[test]
    fn test_brute_force_round() {
        let mut s = solver(fast_settings());
        let report = s.step_brute_force(&Interrupt::new()).unwrap();
        assert_eq!(report.round, 1);
        for agent in 0..2 {
            for &v in s.capacity().row(agent) {
                assert!((0.0..=10.0).contains(&v));
            }
        }
    }
}
