//! Exhaustive grid best response.
//!
//! Every device axis is sampled at `lower + k · step` for all `k` with the
//! point strictly below the upper bound; a zero-width axis contributes only
//! its lower bound. The Cartesian product is enumerated in row-major order
//! and the first point with the smallest net cost wins. The reported
//! objective is that net cost, unsigned.
//!
//! The grid box uses the agent's capacity limit as a floor on the upper
//! bound (see [`FeasibleRegion::grid_search`]).

use capeq_core::{CapeqError, CapeqResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AgentDecision, AgentProblem, BestResponse};
use crate::interrupt::Interrupt;
use crate::region::FeasibleRegion;

/// Interrupt is polled once per this many grid points.
const INTERRUPT_STRIDE: usize = 4096;

/// Points per axis when no explicit steps are configured.
const DEFAULT_AXIS_POINTS: f64 = 8.0;

/// Grid-search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Step per device type, in raw capacity units. When unset, each axis
    /// of the agent's box is split into a fixed number of points.
    pub steps: Option<Vec<f64>>,
    /// Refuse grids with more points than this
    pub max_points: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            steps: None,
            max_points: 10_000_000,
        }
    }
}

impl GridConfig {
    /// Check explicit steps against the number of device types.
    pub fn validate(&self, dims: usize) -> CapeqResult<()> {
        let Some(steps) = &self.steps else {
            return Ok(());
        };
        if steps.len() != dims {
            return Err(CapeqError::shape("grid steps", dims, steps.len()));
        }
        for (j, &step) in steps.iter().enumerate() {
            if !(step > 0.0) || !step.is_finite() {
                return Err(CapeqError::Config(format!(
                    "grid step for device {j} must be positive and finite, got {step}"
                )));
            }
        }
        Ok(())
    }

    /// Step for device `j` over an axis of the given width.
    fn step(&self, j: usize, width: f64) -> f64 {
        match &self.steps {
            Some(steps) => steps[j],
            None if width > 0.0 => width / DEFAULT_AXIS_POINTS,
            None => 1.0,
        }
    }
}

/// Brute-force strategy.
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    pub config: GridConfig,
}

impl GridSearch {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    pub fn with_steps(steps: Vec<f64>) -> Self {
        Self {
            config: GridConfig {
                steps: Some(steps),
                ..GridConfig::default()
            },
        }
    }
}

/// Per-axis sample points.
fn axis_points(lower: f64, upper: f64, step: f64) -> Vec<f64> {
    if upper <= lower {
        return vec![lower];
    }
    let mut points = Vec::new();
    let mut k = 0usize;
    loop {
        let p = lower + k as f64 * step;
        if p >= upper {
            break;
        }
        points.push(p);
        k += 1;
    }
    points
}

fn build_axes(region: &FeasibleRegion, config: &GridConfig) -> CapeqResult<Vec<Vec<f64>>> {
    config.validate(region.dims())?;

    let mut total: usize = 1;
    let mut axes = Vec::with_capacity(region.dims());
    for j in 0..region.dims() {
        let width = region.width(j);
        let step = config.step(j, width);
        let count = (width / step).ceil();
        if count > config.max_points as f64 {
            return Err(grid_too_large(config.max_points));
        }
        let axis = axis_points(region.lower[j], region.upper[j], step);
        total = total
            .checked_mul(axis.len())
            .filter(|t| *t <= config.max_points)
            .ok_or_else(|| grid_too_large(config.max_points))?;
        axes.push(axis);
    }
    Ok(axes)
}

fn grid_too_large(max_points: usize) -> CapeqError {
    CapeqError::Config(format!(
        "grid exceeds {max_points} points; increase the step sizes"
    ))
}

impl BestResponse for GridSearch {
    fn id(&self) -> &str {
        "grid"
    }

    fn optimize(
        &self,
        problem: &AgentProblem<'_>,
        interrupt: &Interrupt,
    ) -> CapeqResult<AgentDecision> {
        let region = FeasibleRegion::grid_search(&problem.region_inputs())?;
        let axes = build_axes(&region, &self.config)?;
        debug!(
            agent = problem.agent,
            upper = ?region.upper,
            points = axes.iter().map(Vec::len).product::<usize>(),
            "grid search"
        );

        let x_other = problem.capacity.others_total(problem.agent);
        let objective = problem.objective(&x_other);

        // Odometer over axis indices, last axis fastest
        let mut index = vec![0usize; axes.len()];
        let mut x: Vec<f64> = axes.iter().map(|a| a[0]).collect();
        let mut best_x = x.clone();
        let mut best_f = f64::INFINITY;
        let mut evaluations = 0usize;

        'outer: loop {
            if evaluations % INTERRUPT_STRIDE == 0 {
                problem.check_interrupt(interrupt)?;
            }
            let f = objective.value(&x)?;
            evaluations += 1;
            if f < best_f {
                best_f = f;
                best_x.copy_from_slice(&x);
            }

            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    break 'outer;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < axes[axis].len() {
                    x[axis] = axes[axis][index[axis]];
                    break;
                }
                index[axis] = 0;
                x[axis] = axes[axis][0];
            }
        }

        debug!(agent = problem.agent, xopt = ?best_x, fopt = best_f, "grid optimum");

        Ok(AgentDecision {
            decision: best_x,
            objective: best_f,
            converged: true,
            evaluations,
            saturated: region.saturated.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(lower: Vec<f64>, upper: Vec<f64>) -> FeasibleRegion {
        FeasibleRegion {
            lower,
            upper,
            saturated: vec![],
        }
    }

    #[test]
    fn test_axis_excludes_upper_endpoint() {
        assert_eq!(axis_points(0.0, 3.0, 1.0), vec![0.0, 1.0, 2.0]);
        assert_eq!(axis_points(0.0, 2.5, 1.0), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_zero_width_axis_keeps_lower() {
        assert_eq!(axis_points(0.0, 0.0, 1.0), vec![0.0]);
    }

    #[test]
    fn test_step_length_mismatch() {
        let r = region(vec![0.0, 0.0], vec![1.0, 1.0]);
        let config = GridConfig {
            steps: Some(vec![1.0]),
            ..GridConfig::default()
        };
        assert!(matches!(
            build_axes(&r, &config),
            Err(CapeqError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_non_positive_step_rejected() {
        let r = region(vec![0.0], vec![1.0]);
        let config = GridConfig {
            steps: Some(vec![0.0]),
            ..GridConfig::default()
        };
        assert!(matches!(build_axes(&r, &config), Err(CapeqError::Config(_))));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let r = region(vec![0.0, 0.0], vec![1000.0, 1000.0]);
        let config = GridConfig {
            steps: Some(vec![0.001, 0.001]),
            max_points: 1_000_000,
        };
        assert!(matches!(build_axes(&r, &config), Err(CapeqError::Config(_))));
    }

    #[test]
    fn test_axes_product() {
        let r = region(vec![0.0, 0.0], vec![2.0, 0.0]);
        let config = GridConfig {
            steps: Some(vec![0.5, 1.0]),
            ..GridConfig::default()
        };
        let axes = build_axes(&r, &config).unwrap();
        assert_eq!(axes[0], vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(axes[1], vec![0.0]);
    }

    #[test]
    fn test_default_steps_follow_box_width() {
        let r = region(vec![0.0, 2.0], vec![4.0, 2.0]);
        let axes = build_axes(&r, &GridConfig::default()).unwrap();
        assert_eq!(axes[0], vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert_eq!(axes[1], vec![2.0]);
    }

    #[test]
    fn test_validate_checks_explicit_steps_only() {
        assert!(GridConfig::default().validate(5).is_ok());
        let config = GridConfig {
            steps: Some(vec![1.0, 1.0, 1.0]),
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(2),
            Err(CapeqError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }
}
