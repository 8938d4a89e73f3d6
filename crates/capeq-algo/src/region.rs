//! Feasible-region construction for one agent's best response.
//!
//! All three optimizers search a box `[lower, upper]` over device types built
//! from the market envelope, the competitors' current aggregate, the agent's
//! own current decision and its capacity limits:
//!
//! ```text
//! (lower_tot, upper_tot) = envelope of node bounds
//! x_other                = Σ_{k≠i} X[k, :]
//!
//! global / gradient search:
//!   upper = clip(upper_tot − x_other, 0, upper_tot)
//!   upper = min(upper, X[i, :] + action_increment)
//!   upper = min(upper, limits_i)
//!
//! grid search:
//!   upper = clip(upper_tot, 0, upper_tot)
//!   upper = min(upper, X[i, :] + action_increment)
//!   upper = max(upper, limits_i)          ← limit acts as a floor here
//!
//! lower = 0
//! ```
//!
//! Gradient search applies the same rules after dividing every quantity by
//! the capacity scale.
//!
//! A device whose upper bound ends below its lower bound is *saturated*: the
//! interval is clamped to zero width at the lower bound, unless strict mode
//! asks for a [`CapeqError::DegenerateBounds`] instead.

use capeq_core::{AgentMatrix, CapeqError, CapeqResult, DataScale, NodeBounds};

/// Search box for one agent in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibleRegion {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Devices clamped to zero width
    pub saturated: Vec<usize>,
}

/// Per-agent inputs needed to build a region.
#[derive(Debug, Clone, Copy)]
pub struct RegionInputs<'a> {
    pub nodes: &'a NodeBounds,
    pub capacity: &'a AgentMatrix,
    pub agent: usize,
    pub limits: &'a [f64],
    pub action_increment: f64,
    pub strict: bool,
}

impl FeasibleRegion {
    /// Box for the evolutionary optimizer (limits cap the upper bound).
    pub fn global_search(inputs: &RegionInputs<'_>) -> CapeqResult<Self> {
        let (_, upper_tot) = inputs.nodes.aggregate();
        let x_other = inputs.capacity.others_total(inputs.agent);
        let x_current = inputs.capacity.row(inputs.agent);

        let upper: Vec<f64> = (0..upper_tot.len())
            .map(|j| {
                let headroom = clip(upper_tot[j] - x_other[j], 0.0, upper_tot[j]);
                headroom
                    .min(x_current[j] + inputs.action_increment)
                    .min(inputs.limits[j])
            })
            .collect();

        Self::finish(vec![0.0; upper.len()], upper, inputs.strict)
    }

    /// Box for brute-force grid search (limits act as a floor on the upper bound).
    pub fn grid_search(inputs: &RegionInputs<'_>) -> CapeqResult<Self> {
        let (_, upper_tot) = inputs.nodes.aggregate();
        let x_current = inputs.capacity.row(inputs.agent);

        let upper: Vec<f64> = (0..upper_tot.len())
            .map(|j| {
                clip(upper_tot[j], 0.0, upper_tot[j])
                    .min(x_current[j] + inputs.action_increment)
                    .max(inputs.limits[j])
            })
            .collect();

        Self::finish(vec![0.0; upper.len()], upper, inputs.strict)
    }

    /// Box for gradient search, in normalized capacity units.
    pub fn gradient_search(inputs: &RegionInputs<'_>, scale: &DataScale) -> CapeqResult<Self> {
        let (_, upper_tot) = inputs.nodes.aggregate();
        let upper_tot = scale.normalize(&upper_tot);
        let x_other = scale.normalize(&inputs.capacity.others_total(inputs.agent));
        let x_current = scale.normalize(inputs.capacity.row(inputs.agent));
        let limits = scale.normalize(inputs.limits);
        let increment = inputs.action_increment / scale.capacity;

        let upper: Vec<f64> = (0..upper_tot.len())
            .map(|j| {
                clip(upper_tot[j] - x_other[j], 0.0, upper_tot[j])
                    .min(x_current[j] + increment)
                    .min(limits[j])
            })
            .collect();

        Self::finish(vec![0.0; upper.len()], upper, inputs.strict)
    }

    fn finish(lower: Vec<f64>, mut upper: Vec<f64>, strict: bool) -> CapeqResult<Self> {
        let mut saturated = Vec::new();
        for j in 0..upper.len() {
            // NaN fails this comparison as well
            if !(upper[j] >= lower[j]) {
                if strict {
                    return Err(CapeqError::DegenerateBounds {
                        device: j,
                        lower: lower[j],
                        upper: upper[j],
                    });
                }
                upper[j] = lower[j];
                saturated.push(j);
            } else if upper[j].is_infinite() {
                return Err(CapeqError::Config(format!(
                    "feasible region is unbounded for device {j}; \
                     set finite node upper bounds or capacity limits"
                )));
            }
        }
        Ok(Self {
            lower,
            upper,
            saturated,
        })
    }

    pub fn dims(&self) -> usize {
        self.lower.len()
    }

    pub fn width(&self, device: usize) -> f64 {
        self.upper[device] - self.lower[device]
    }

    /// True when every interval has zero width.
    pub fn is_point(&self) -> bool {
        (0..self.dims()).all(|j| self.width(j) == 0.0)
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dims()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Project `x` onto the box.
    pub fn project(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.max(*lo).min(*hi);
        }
    }
}

/// numpy-style clip: `min(max(x, lo), hi)`.
fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}
