//! Normalization scales shared with surrogate training.
//!
//! Surrogates with analytic gradients are trained on capacities divided by
//! the largest capacity observed anywhere in the training table, and on the
//! inverted revenue target `1 - revenue / max_revenue`. The gradient-based
//! optimizer must search in that same normalized space, so it needs the two
//! scale factors.

use serde::{Deserialize, Serialize};

use crate::{CapeqError, CapeqResult};

/// Capacity and revenue scale factors of a training table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataScale {
    pub capacity: f64,
    #[serde(default = "default_revenue_scale")]
    pub revenue: f64,
}

fn default_revenue_scale() -> f64 {
    1.0
}

impl Default for DataScale {
    fn default() -> Self {
        Self::identity()
    }
}

impl DataScale {
    /// No normalization.
    pub fn identity() -> Self {
        Self {
            capacity: 1.0,
            revenue: 1.0,
        }
    }

    pub fn new(capacity: f64, revenue: f64) -> CapeqResult<Self> {
        let scale = Self { capacity, revenue };
        scale.validate()?;
        Ok(scale)
    }

    /// Capacity scale = max entry of the capacity sample table.
    pub fn from_capacity_samples(samples: &[Vec<f64>]) -> CapeqResult<Self> {
        Self::new(table_max(samples, "capacity samples")?, 1.0)
    }

    /// Both scales from capacity and revenue sample tables.
    pub fn from_samples(capacity: &[Vec<f64>], revenue: &[Vec<f64>]) -> CapeqResult<Self> {
        Self::new(
            table_max(capacity, "capacity samples")?,
            table_max(revenue, "revenue samples")?,
        )
    }

    pub fn validate(&self) -> CapeqResult<()> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(CapeqError::Config(format!(
                "capacity scale must be positive and finite, got {}",
                self.capacity
            )));
        }
        if !(self.revenue.is_finite() && self.revenue > 0.0) {
            return Err(CapeqError::Config(format!(
                "revenue scale must be positive and finite, got {}",
                self.revenue
            )));
        }
        Ok(())
    }

    pub fn normalize(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v / self.capacity).collect()
    }

    pub fn denormalize(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.capacity).collect()
    }

    /// Map an inverted normalized revenue back to revenue units.
    pub fn revenue_from_target(&self, target: f64) -> f64 {
        (1.0 - target) * self.revenue
    }
}

fn table_max(samples: &[Vec<f64>], what: &str) -> CapeqResult<f64> {
    samples
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .ok_or_else(|| CapeqError::Config(format!("{what} are empty")))
}
