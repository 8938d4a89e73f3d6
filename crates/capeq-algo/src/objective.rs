//! Agent objective functions.
//!
//! ## Net-cost objective (derivative-free search)
//!
//! For agent `i` with decision `x_i`, competitors' aggregate `x_other` and
//! per-unit capital costs `c`:
//!
//! ```text
//! x_tot = x_i + x_other
//! f(x_i) = Σ_j [ c_j · x_i,j − R_j(x_tot) · x_i,j / x_tot,j ]     (x_tot,j ≠ 0)
//!        + α · ‖x_i − x_i,prev‖²                                  (optional)
//! ```
//!
//! `R_j` is the surrogate's predicted market revenue for device `j`, shared
//! among agents in proportion to installed capacity. Devices with zero total
//! capacity contribute nothing (their cost term is zero as well, since
//! `x_i,j = 0` there). Callers minimize `f`.
//!
//! ## Surrogate-gradient objective
//!
//! For differentiable surrogates trained on the inverted normalized revenue
//! target, the objective is the summed surrogate output and its gradient with
//! respect to the agent's own decision `u`:
//!
//! ```text
//! y(u)      = Σ_k R_k(x_tot)
//! ∂y/∂u_j   = Σ_k [ ∂R_k/∂x_tot,j · u_j / x_tot,j + R_k · (x_tot,j − u_j) / x_tot,j² ]   (x_tot,j ≠ 0)
//!           = Σ_k   ∂R_k/∂x_tot,j                                                      (x_tot,j = 0)
//! ```
//!
//! The second branch is the limit of the allocation ratio as the total goes to
//! zero. Capital cost is not subtracted here.

use capeq_core::{CapeqError, CapeqResult, SurrogateSet};
use serde::{Deserialize, Serialize};

/// Quadratic damping of the move away from the previous decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regularization {
    pub alpha: f64,
}

impl Regularization {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn penalty(&self, x: &[f64], x_prev: &[f64]) -> f64 {
        let sq: f64 = x.iter().zip(x_prev).map(|(a, b)| (a - b) * (a - b)).sum();
        self.alpha * sq
    }
}

impl Default for Regularization {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

/// Net cost (capital cost minus allocated predicted revenue) of decision `x_i`.
pub fn profit_objective(
    x_i: &[f64],
    x_prev: &[f64],
    x_other: &[f64],
    costs: &[f64],
    models: &SurrogateSet,
    regularization: Option<&Regularization>,
) -> CapeqResult<f64> {
    let n = costs.len();
    check_len("agent decision", n, x_i.len())?;
    check_len("competitor aggregate", n, x_other.len())?;
    check_len("surrogate set", n, models.len())?;

    let x_tot: Vec<f64> = x_i.iter().zip(x_other).map(|(a, b)| a + b).collect();

    let mut y = 0.0;
    for j in 0..n {
        if x_tot[j] == 0.0 {
            continue;
        }
        let net_rev = models.predict(j, &x_tot)? * (x_i[j] / x_tot[j]);
        let total_cost = costs[j] * x_i[j];
        y += total_cost - net_rev;
    }

    if let Some(reg) = regularization {
        check_len("previous decision", n, x_prev.len())?;
        y += reg.penalty(x_i, x_prev);
    }
    Ok(y)
}

/// Summed surrogate output and its gradient w.r.t. the agent's decision `u`.
pub fn surrogate_profit_and_gradient(
    u: &[f64],
    x_other: &[f64],
    models: &SurrogateSet,
) -> CapeqResult<(f64, Vec<f64>)> {
    let n = u.len();
    check_len("competitor aggregate", n, x_other.len())?;
    check_len("surrogate set", n, models.len())?;

    let x_tot: Vec<f64> = u.iter().zip(x_other).map(|(a, b)| a + b).collect();

    let mut y = 0.0;
    let mut grad = vec![0.0; n];
    for k in 0..models.len() {
        let pred = models.predict(k, &x_tot)?;
        let g = models.gradient(k, &x_tot)?;
        y += pred;
        for j in 0..n {
            if x_tot[j] == 0.0 {
                grad[j] += g[j];
            } else {
                grad[j] += g[j] * (u[j] / x_tot[j])
                    + (x_tot[j] - u[j]) / (x_tot[j] * x_tot[j]) * pred;
            }
        }
    }
    Ok((y, grad))
}

/// Net-cost objective bound to one agent's round context.
#[derive(Debug, Clone, Copy)]
pub struct AgentObjective<'a> {
    pub x_prev: &'a [f64],
    pub x_other: &'a [f64],
    pub costs: &'a [f64],
    pub models: &'a SurrogateSet,
    pub regularization: Option<&'a Regularization>,
}

impl AgentObjective<'_> {
    pub fn value(&self, x: &[f64]) -> CapeqResult<f64> {
        profit_objective(
            x,
            self.x_prev,
            self.x_other,
            self.costs,
            self.models,
            self.regularization,
        )
    }
}

fn check_len(what: &str, expected: usize, actual: usize) -> CapeqResult<()> {
    if expected != actual {
        return Err(CapeqError::shape(what, expected, actual));
    }
    Ok(())
}
