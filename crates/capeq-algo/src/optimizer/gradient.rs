//! Gradient-based best response: penalty method with L-BFGS.
//!
//! Works in normalized capacity units (`x / scale.capacity`). The box
//! constraints of the gradient region are folded into the objective as an
//! exterior quadratic penalty:
//!
//! ```text
//! P_μ(u) = Σ_k s_k(u + x_other) + μ · Σ_j [ max(0, lb_j − u_j)² + max(0, u_j − ub_j)² ]
//! ```
//!
//! where `Σ_k s_k` is the summed surrogate output of
//! [`surrogate_profit_and_gradient`]. Each outer pass runs L-BFGS with a
//! More-Thuente line search from the previous pass's best point, then grows
//! μ by `penalty_growth` unless the bound violation is already below the
//! tolerance. The final point is projected onto the box.
//!
//! Restarts begin either at a random point (when the agent currently holds
//! nothing) or at a small perturbation of the current normalized decision
//! that shrinks as rounds progress. The restart with the smallest surrogate
//! output wins and is returned in raw units.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use capeq_core::{CapeqError, CapeqResult, SurrogateSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{AgentDecision, AgentProblem, BestResponse};
use crate::interrupt::Interrupt;
use crate::objective::surrogate_profit_and_gradient;
use crate::region::FeasibleRegion;

/// Gradient-search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// Independent starting points
    pub restarts: usize,
    /// L-BFGS iteration budget, shared across penalty passes
    pub max_iterations: u64,
    /// Gradient-norm and bound-violation tolerance
    pub tolerance: f64,
    /// Per-device perturbation around a nonzero current decision
    /// (normalized units, divided by the round number). Defaults to 0.1
    /// for every device.
    pub start_perturbation: Option<Vec<f64>>,
    /// Per-device scale of the uniform start when the agent holds nothing.
    /// Defaults to 1.0 for every device.
    pub zero_start_scale: Option<Vec<f64>>,
    /// Initial penalty weight μ
    pub initial_penalty: f64,
    /// Multiplier applied to μ after each pass
    pub penalty_growth: f64,
    /// Maximum number of penalty passes
    pub penalty_passes: usize,
    /// L-BFGS history length
    pub lbfgs_memory: usize,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            restarts: 3,
            max_iterations: 10_000,
            tolerance: 1e-6,
            start_perturbation: None,
            zero_start_scale: None,
            initial_penalty: 1e3,
            penalty_growth: 10.0,
            penalty_passes: 5,
            lbfgs_memory: 7,
        }
    }
}

impl GradientConfig {
    /// Check per-device start vectors against `dims` and the penalty settings.
    pub fn validate(&self, dims: usize) -> CapeqResult<()> {
        for (what, v) in [
            ("start_perturbation", &self.start_perturbation),
            ("zero_start_scale", &self.zero_start_scale),
        ] {
            if let Some(v) = v {
                if v.len() != dims {
                    return Err(CapeqError::shape(what, dims, v.len()));
                }
            }
        }
        if !(self.tolerance > 0.0) {
            return Err(CapeqError::Config(format!(
                "gradient tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.initial_penalty > 0.0) || !(self.penalty_growth >= 1.0) {
            return Err(CapeqError::Config(
                "penalty weight must be positive and growth at least 1".into(),
            ));
        }
        if self.lbfgs_memory == 0 {
            return Err(CapeqError::Config("lbfgs_memory must be at least 1".into()));
        }
        Ok(())
    }
}

/// Penalty-L-BFGS strategy.
#[derive(Debug, Clone, Default)]
pub struct GradientSearch {
    pub config: GradientConfig,
}

impl GradientSearch {
    pub fn new(config: GradientConfig) -> Self {
        Self { config }
    }
}

/// Summed surrogate output plus exterior bound penalty.
struct PenalizedSurrogate<'a> {
    x_other: &'a [f64],
    models: &'a SurrogateSet,
    penalty: f64,
    lb: &'a [f64],
    ub: &'a [f64],
    evaluations: &'a AtomicUsize,
    /// First surrogate failure seen inside the optimizer loop
    failure: &'a Mutex<Option<CapeqError>>,
}

impl PenalizedSurrogate<'_> {
    fn evaluate(&self, u: &[f64]) -> Result<(f64, Vec<f64>), argmin::core::Error> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let (mut y, mut grad) = match surrogate_profit_and_gradient(u, self.x_other, self.models)
        {
            Ok(v) => v,
            Err(err) => {
                let message = err.to_string();
                if let Ok(mut slot) = self.failure.lock() {
                    slot.get_or_insert(err);
                }
                return Err(argmin::core::Error::msg(message));
            }
        };
        for j in 0..u.len() {
            let below = (self.lb[j] - u[j]).max(0.0);
            let above = (u[j] - self.ub[j]).max(0.0);
            y += self.penalty * (below * below + above * above);
            grad[j] += 2.0 * self.penalty * (above - below);
        }
        Ok((y, grad))
    }
}

impl CostFunction for PenalizedSurrogate<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.evaluate(u)?.0)
    }
}

impl Gradient for PenalizedSurrogate<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, u: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        Ok(self.evaluate(u)?.1)
    }
}

fn max_bound_violation(x: &[f64], lb: &[f64], ub: &[f64]) -> f64 {
    x.iter()
        .zip(lb.iter().zip(ub))
        .map(|(v, (lo, hi))| (lo - v).max(v - hi).max(0.0))
        .fold(0.0, f64::max)
}

/// Result of one restart, in normalized units.
struct LocalSolution {
    u: Vec<f64>,
    fun: f64,
    converged: bool,
}

impl GradientSearch {
    fn solve_from(
        &self,
        start: Vec<f64>,
        region: &FeasibleRegion,
        x_other: &[f64],
        models: &SurrogateSet,
        evaluations: &AtomicUsize,
    ) -> CapeqResult<LocalSolution> {
        let config = &self.config;
        let failure = Mutex::new(None);
        let passes = config.penalty_passes.max(1);
        let inner_max_iter = (config.max_iterations / passes as u64).max(1);

        let mut u = start;
        let mut penalty = config.initial_penalty;
        let mut converged = false;

        for pass in 0..passes {
            let problem = PenalizedSurrogate {
                x_other,
                models,
                penalty,
                lb: &region.lower,
                ub: &region.upper,
                evaluations,
                failure: &failure,
            };
            let solver = LBFGS::new(MoreThuenteLineSearch::new(), config.lbfgs_memory)
                .with_tolerance_grad(config.tolerance)
                .map_err(CapeqError::from)?;
            let executor = Executor::new(problem, solver)
                .configure(|state| state.param(u.clone()).max_iters(inner_max_iter));

            let stalled = match executor.run() {
                Ok(res) => {
                    let iters = res.state().get_iter();
                    if let Some(best) = res.state().get_best_param() {
                        u = best.clone();
                    }
                    iters >= inner_max_iter
                }
                Err(err) => {
                    if let Some(cause) = failure.lock().ok().and_then(|mut slot| slot.take()) {
                        return Err(cause);
                    }
                    let err = CapeqError::from(err);
                    if matches!(
                        err.root(),
                        CapeqError::SurrogateFailure { .. } | CapeqError::ShapeMismatch { .. }
                    ) {
                        return Err(err);
                    }
                    // Line-search breakdown: keep the current point, raise μ
                    trace!(pass, error = %err, "L-BFGS pass failed");
                    true
                }
            };

            let violation = max_bound_violation(&u, &region.lower, &region.upper);
            if violation < config.tolerance {
                converged = !stalled;
                break;
            }
            penalty *= config.penalty_growth;
        }

        region.project(&mut u);
        let (fun, _) = surrogate_profit_and_gradient(&u, x_other, models)?;
        evaluations.fetch_add(1, Ordering::Relaxed);
        Ok(LocalSolution { u, fun, converged })
    }
}

impl BestResponse for GradientSearch {
    fn id(&self) -> &str {
        "gradient"
    }

    fn optimize(
        &self,
        problem: &AgentProblem<'_>,
        interrupt: &Interrupt,
    ) -> CapeqResult<AgentDecision> {
        let scale = problem.scale;
        let region = FeasibleRegion::gradient_search(&problem.region_inputs(), scale)?;
        let dims = region.dims();
        self.config.validate(dims)?;
        debug!(
            agent = problem.agent,
            lower = ?region.lower,
            upper = ?region.upper,
            "gradient search bounds (normalized)"
        );

        let x_other = scale.normalize(&problem.capacity.others_total(problem.agent));
        let current = scale.normalize(problem.current());
        let holds_nothing = current.iter().all(|v| *v == 0.0);
        let divisor = problem.iteration_count.max(1) as f64;
        let perturbation = self
            .config
            .start_perturbation
            .clone()
            .unwrap_or_else(|| vec![0.1; dims]);
        let zero_scale = self
            .config
            .zero_start_scale
            .clone()
            .unwrap_or_else(|| vec![1.0; dims]);

        let evaluations = AtomicUsize::new(0);
        let mut best: Option<LocalSolution> = None;

        for restart in 0..self.config.restarts.max(1) {
            problem.check_interrupt(interrupt)?;
            let mut rng = problem.rng(restart);
            let start: Vec<f64> = (0..dims)
                .map(|j| {
                    let r: f64 = rng.gen();
                    if holds_nothing {
                        r * zero_scale[j]
                    } else {
                        current[j] + r * perturbation[j] / divisor
                    }
                })
                .collect();

            let solution = self.solve_from(start, &region, &x_other, problem.models, &evaluations)?;
            trace!(agent = problem.agent, restart, fun = solution.fun, "gradient restart");
            if best.as_ref().map_or(true, |b| solution.fun < b.fun) {
                best = Some(solution);
            }
        }

        let best = best.ok_or_else(|| CapeqError::Other("no gradient restart ran".into()))?;
        let decision = scale.denormalize(&best.u);
        debug!(agent = problem.agent, xopt = ?decision, fopt = best.fun, "gradient optimum");

        Ok(AgentDecision {
            decision,
            objective: best.fun,
            converged: best.converged,
            evaluations: evaluations.into_inner(),
            saturated: region.saturated.clone(),
        })
    }
}
