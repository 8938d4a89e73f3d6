//! Surrogate revenue models.
//!
//! A surrogate maps the vector of *total* installed capacity per device type
//! to the revenue the whole market earns on one device type. One surrogate
//! exists per device type; together they form a [`SurrogateSet`] indexed the
//! same way as the capacity matrix columns.
//!
//! The solver treats surrogates as opaque, side-effect free functions. Models
//! trained elsewhere (gradient-boosted trees, input-convex networks) plug in
//! by implementing [`Surrogate`]; gradient-based search additionally needs
//! [`Surrogate::gradient`].
//!
//! ```
//! use capeq_core::surrogate::{LinearSurrogate, SurrogateSet};
//!
//! let models = SurrogateSet::from_models(vec![
//!     LinearSurrogate::new(0.0, vec![1.0, 1.0]),
//!     LinearSurrogate::new(0.0, vec![1.0, 1.0]),
//! ]);
//! assert_eq!(models.predict(0, &[2.0, 3.0]).unwrap(), 5.0);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{CapeqError, CapeqResult};

/// A revenue model for one device type.
pub trait Surrogate: Send + Sync {
    /// Predicted market revenue for this device type at total capacity `x`.
    fn predict(&self, x: &[f64]) -> CapeqResult<f64>;

    /// d(prediction)/dx at `x`, if the model is differentiable.
    fn gradient(&self, _x: &[f64]) -> Option<CapeqResult<Vec<f64>>> {
        None
    }
}

/// Ordered per-device surrogate models.
#[derive(Clone, Default)]
pub struct SurrogateSet {
    models: Vec<Arc<dyn Surrogate>>,
}

impl fmt::Debug for SurrogateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrogateSet")
            .field("len", &self.models.len())
            .finish()
    }
}

impl SurrogateSet {
    pub fn new(models: Vec<Arc<dyn Surrogate>>) -> Self {
        Self { models }
    }

    /// Convenience constructor for a homogeneous list of concrete models.
    pub fn from_models<S: Surrogate + 'static>(models: Vec<S>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| Arc::new(m) as Arc<dyn Surrogate>)
                .collect(),
        }
    }

    pub fn push(&mut self, model: Arc<dyn Surrogate>) {
        self.models.push(model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Validated prediction: non-finite output is a surrogate failure.
    pub fn predict(&self, device: usize, x: &[f64]) -> CapeqResult<f64> {
        let model = self.model(device)?;
        let y = model.predict(x).map_err(|e| surrogate_error(device, e))?;
        if !y.is_finite() {
            return Err(CapeqError::SurrogateFailure {
                device,
                reason: format!("prediction is not finite ({y})"),
            });
        }
        Ok(y)
    }

    /// Validated gradient: must exist, have `x.len()` entries and be finite.
    pub fn gradient(&self, device: usize, x: &[f64]) -> CapeqResult<Vec<f64>> {
        let model = self.model(device)?;
        let grad = model
            .gradient(x)
            .ok_or_else(|| CapeqError::SurrogateFailure {
                device,
                reason: "model does not provide a gradient".to_string(),
            })?
            .map_err(|e| surrogate_error(device, e))?;
        if grad.len() != x.len() {
            return Err(CapeqError::SurrogateFailure {
                device,
                reason: format!("gradient has {} entries, expected {}", grad.len(), x.len()),
            });
        }
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(CapeqError::SurrogateFailure {
                device,
                reason: "gradient is not finite".to_string(),
            });
        }
        Ok(grad)
    }

    /// True when every model exposes a gradient at `x`.
    pub fn supports_gradient(&self, x: &[f64]) -> bool {
        self.models.iter().all(|m| m.gradient(x).is_some())
    }

    fn model(&self, device: usize) -> CapeqResult<&Arc<dyn Surrogate>> {
        self.models
            .get(device)
            .ok_or_else(|| CapeqError::shape("surrogate device index", self.models.len(), device))
    }
}

fn surrogate_error(device: usize, err: CapeqError) -> CapeqError {
    match err {
        err @ CapeqError::SurrogateFailure { .. } => err,
        other => CapeqError::SurrogateFailure {
            device,
            reason: other.to_string(),
        },
    }
}

fn check_input(x: &[f64], expected: usize) -> CapeqResult<()> {
    if x.len() != expected {
        return Err(CapeqError::shape("surrogate input", expected, x.len()));
    }
    Ok(())
}

/// `y = intercept + coefficients · x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSurrogate {
    #[serde(default)]
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearSurrogate {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// `y = sum(x)` over `n` device types.
    pub fn sum(n: usize) -> Self {
        Self::new(0.0, vec![1.0; n])
    }
}

impl Surrogate for LinearSurrogate {
    fn predict(&self, x: &[f64]) -> CapeqResult<f64> {
        check_input(x, self.coefficients.len())?;
        Ok(self.intercept + dot(&self.coefficients, x))
    }

    fn gradient(&self, x: &[f64]) -> Option<CapeqResult<Vec<f64>>> {
        Some(check_input(x, self.coefficients.len()).map(|_| self.coefficients.clone()))
    }
}

/// `y = intercept + linear · x + Σ quadratic_j x_j²`
///
/// Negative quadratic terms give the saturating revenue shape typical of a
/// market where added capacity depresses prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticSurrogate {
    #[serde(default)]
    pub intercept: f64,
    pub linear: Vec<f64>,
    pub quadratic: Vec<f64>,
}

impl QuadraticSurrogate {
    pub fn new(intercept: f64, linear: Vec<f64>, quadratic: Vec<f64>) -> CapeqResult<Self> {
        if linear.len() != quadratic.len() {
            return Err(CapeqError::shape(
                "quadratic surrogate terms",
                linear.len(),
                quadratic.len(),
            ));
        }
        Ok(Self {
            intercept,
            linear,
            quadratic,
        })
    }
}

impl Surrogate for QuadraticSurrogate {
    fn predict(&self, x: &[f64]) -> CapeqResult<f64> {
        check_input(x, self.linear.len())?;
        let quad: f64 = self
            .quadratic
            .iter()
            .zip(x)
            .map(|(q, xi)| q * xi * xi)
            .sum();
        Ok(self.intercept + dot(&self.linear, x) + quad)
    }

    fn gradient(&self, x: &[f64]) -> Option<CapeqResult<Vec<f64>>> {
        Some(check_input(x, self.linear.len()).map(|_| {
            self.linear
                .iter()
                .zip(&self.quadratic)
                .zip(x)
                .map(|((b, q), xi)| b + 2.0 * q * xi)
                .collect()
        }))
    }
}

type PredictFn = dyn Fn(&[f64]) -> f64 + Send + Sync;
type GradientFn = dyn Fn(&[f64]) -> Vec<f64> + Send + Sync;

/// Closure-backed surrogate, for embedding externally trained models.
pub struct FnSurrogate {
    predict: Box<PredictFn>,
    gradient: Option<Box<GradientFn>>,
}

impl FnSurrogate {
    pub fn new(predict: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            predict: Box::new(predict),
            gradient: None,
        }
    }

    pub fn with_gradient(
        mut self,
        gradient: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.gradient = Some(Box::new(gradient));
        self
    }
}

impl Surrogate for FnSurrogate {
    fn predict(&self, x: &[f64]) -> CapeqResult<f64> {
        Ok((self.predict)(x))
    }

    fn gradient(&self, x: &[f64]) -> Option<CapeqResult<Vec<f64>>> {
        self.gradient.as_ref().map(|g| Ok(g(x)))
    }
}

/// Serializable description of a closed-form surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SurrogateSpec {
    Linear(LinearSurrogate),
    Quadratic(QuadraticSurrogate),
}

impl SurrogateSpec {
    /// Number of device types the model expects as input.
    pub fn input_len(&self) -> usize {
        match self {
            SurrogateSpec::Linear(m) => m.coefficients.len(),
            SurrogateSpec::Quadratic(m) => m.linear.len(),
        }
    }

    pub fn build(&self) -> CapeqResult<Arc<dyn Surrogate>> {
        Ok(match self {
            SurrogateSpec::Linear(m) => Arc::new(m.clone()),
            SurrogateSpec::Quadratic(m) => Arc::new(QuadraticSurrogate::new(
                m.intercept,
                m.linear.clone(),
                m.quadratic.clone(),
            )?),
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_gradient_matches_finite_difference() {
        let model = QuadraticSurrogate::new(1.0, vec![2.0, -1.0], vec![-0.5, 0.25]).unwrap();
        let x = [1.5, 3.0];
        let grad = model.gradient(&x).unwrap().unwrap();

        let eps = 1e-6;
        for j in 0..2 {
            let mut xp = x;
            xp[j] += eps;
            let fd = (model.predict(&xp).unwrap() - model.predict(&x).unwrap()) / eps;
            assert!((fd - grad[j]).abs() < 1e-4, "device {j}: fd {fd} vs {}", grad[j]);
        }
    }

    #[test]
    fn test_set_rejects_nan_prediction() {
        let models = SurrogateSet::from_models(vec![FnSurrogate::new(|_| f64::NAN)]);
        let err = models.predict(0, &[1.0]).unwrap_err();
        assert!(matches!(err, CapeqError::SurrogateFailure { device: 0, .. }));
    }

    #[test]
    fn test_set_rejects_wrong_gradient_shape() {
        let models = SurrogateSet::from_models(vec![
            FnSurrogate::new(|x| x[0]).with_gradient(|_| vec![1.0, 2.0, 3.0])
        ]);
        let err = models.gradient(0, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, CapeqError::SurrogateFailure { .. }));
    }

    #[test]
    fn test_missing_gradient_is_surrogate_failure() {
        let models = SurrogateSet::from_models(vec![FnSurrogate::new(|x| x[0])]);
        assert!(!models.supports_gradient(&[1.0]));
        assert!(models.gradient(0, &[1.0]).is_err());
    }

    #[test]
    fn test_input_length_is_checked() {
        let models = SurrogateSet::from_models(vec![LinearSurrogate::sum(3)]);
        let err = models.predict(0, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CapeqError::SurrogateFailure { device: 0, .. }));
    }

    #[test]
    fn test_spec_deserializes_tagged() {
        let json = r#"{"kind": "quadratic", "intercept": 0.0, "linear": [1.0], "quadratic": [-0.1]}"#;
        let spec: SurrogateSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.input_len(), 1);
        let model = spec.build().unwrap();
        assert!((model.predict(&[2.0]).unwrap() - 1.6).abs() < 1e-12);
    }
}
