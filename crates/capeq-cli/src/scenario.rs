//! TOML scenario files.
//!
//! ```toml
//! devices = ["wind", "solar"]
//! rounds = 5
//!
//! [[agents]]
//! name = "utility"
//! capital_costs = [1.0, 1.2]
//! limits = [10.0, 10.0]
//! start = [0.0, 0.0]          # optional warm start
//!
//! [[nodes]]
//! lower = [0.0, 0.0]
//! upper = [10.0, 10.0]
//!
//! [[surrogates]]               # one per device, in device order
//! kind = "linear"
//! intercept = 0.0
//! coefficients = [1.0, 1.0]
//!
//! [scale]                      # optional, defaults to no normalization
//! capacity = 10.0
//!
//! [settings]                   # optional, see SolverSettings
//! seed = 7
//! action_increment = 2.0
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use capeq_algo::{DiagonalizedSolver, SolverSettings};
use capeq_core::{
    AgentMatrix, CapeqError, CapeqResult, DataScale, NodeBound, NodeBounds, SurrogateSet,
    SurrogateSpec,
};
use serde::{Deserialize, Serialize};

/// One investor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub capital_costs: Vec<f64>,
    pub limits: Vec<f64>,
    #[serde(default)]
    pub start: Option<Vec<f64>>,
}

/// Normalization scale: explicit values or derived from capacity samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleSpec {
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    /// Training capacity table; its largest entry becomes the capacity scale
    #[serde(default)]
    pub capacity_samples: Option<Vec<Vec<f64>>>,
}

impl ScaleSpec {
    pub fn build(&self) -> CapeqResult<DataScale> {
        let mut scale = match &self.capacity_samples {
            Some(samples) => DataScale::from_capacity_samples(samples)?,
            None => DataScale::identity(),
        };
        if let Some(capacity) = self.capacity {
            scale.capacity = capacity;
        }
        if let Some(revenue) = self.revenue {
            scale.revenue = revenue;
        }
        scale.validate()?;
        Ok(scale)
    }
}

/// Complete scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub devices: Vec<String>,
    /// Default round budget
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    pub agents: Vec<AgentSpec>,
    pub nodes: Vec<NodeBound>,
    pub surrogates: Vec<SurrogateSpec>,
    #[serde(default)]
    pub scale: ScaleSpec,
    #[serde(default)]
    pub settings: SolverSettings,
}

fn default_rounds() -> usize {
    10
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing scenario file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(text)?;
        Ok(scenario)
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents
            .iter()
            .enumerate()
            .map(|(i, a)| a.name.clone().unwrap_or_else(|| format!("agent_{i}")))
            .collect()
    }

    /// Build a solver, applying any warm start. Every shape is checked.
    pub fn build_solver(&self) -> CapeqResult<DiagonalizedSolver> {
        let n = self.num_devices();
        if n == 0 {
            return Err(CapeqError::Config("scenario lists no devices".into()));
        }
        if self.agents.is_empty() {
            return Err(CapeqError::Config("scenario lists no agents".into()));
        }

        let costs = AgentMatrix::from_rows(
            self.agents.iter().map(|a| a.capital_costs.clone()).collect(),
        )?;
        let limits = AgentMatrix::from_rows(self.agents.iter().map(|a| a.limits.clone()).collect())?;
        costs.ensure_shape("capital costs", self.agents.len(), n)?;

        let mut models = SurrogateSet::default();
        for (j, spec) in self.surrogates.iter().enumerate() {
            if spec.input_len() != n {
                return Err(CapeqError::shape(
                    format!("surrogate {j} inputs"),
                    n,
                    spec.input_len(),
                ));
            }
            models.push(spec.build()?);
        }

        let mut solver = DiagonalizedSolver::new(
            costs,
            limits,
            NodeBounds::new(self.nodes.clone()),
            models,
            self.settings.clone(),
        )?
        .with_device_names(self.devices.clone())?
        .with_scale(self.scale.build()?)?;

        if self.agents.iter().any(|a| a.start.is_some()) {
            let rows = self
                .agents
                .iter()
                .map(|a| a.start.clone().unwrap_or_else(|| vec![0.0; n]))
                .collect();
            solver.set_starting_capacity(AgentMatrix::from_rows(rows)?)?;
        }
        Ok(solver)
    }

    /// Non-fatal oddities worth reporting before a run.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (i, agent) in self.agents.iter().enumerate() {
            for (j, (&cost, &limit)) in agent.capital_costs.iter().zip(&agent.limits).enumerate() {
                let device = self.devices.get(j).map_or("?", String::as_str);
                if limit <= 0.0 {
                    warnings.push(format!(
                        "agent {i} has a non-positive limit for {device}; it can never invest"
                    ));
                }
                if cost < 0.0 {
                    warnings.push(format!("agent {i} has a negative capital cost for {device}"));
                }
            }
        }
        if self.settings.seed.is_none() {
            warnings.push("no seed set; results will vary between runs".into());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
devices = ["wind", "solar"]
rounds = 3

[[agents]]
name = "first"
capital_costs = [1.0, 1.0]
limits = [10.0, 10.0]

[[agents]]
capital_costs = [1.0, 1.0]
limits = [10.0, 10.0]
start = [1.0, 2.0]

[[nodes]]
lower = [0.0, 0.0]
upper = [10.0, 10.0]

[[surrogates]]
kind = "linear"
coefficients = [1.0, 1.0]

[[surrogates]]
kind = "quadratic"
intercept = 1.0
linear = [1.0, 1.0]
quadratic = [-0.01, -0.01]

[scale]
capacity_samples = [[1.0, 4.0], [8.0, 2.0]]

[settings]
seed = 3
action_increment = 2.5

[settings.evolutionary]
popsize = 12
restarts = 1
"#;

    #[test]
    fn test_parse_and_build() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.rounds, 3);
        assert_eq!(scenario.agent_names(), vec!["first", "agent_1"]);
        assert_eq!(scenario.settings.evolutionary.popsize, 12);
        assert_eq!(scenario.settings.evolutionary.mutation, 0.5);
        assert_eq!(scenario.scale.build().unwrap().capacity, 8.0);

        let solver = scenario.build_solver().unwrap();
        assert_eq!(solver.num_agents(), 2);
        assert_eq!(solver.device_names(), &["wind", "solar"]);
        assert_eq!(solver.capacity().row(1), &[1.0, 2.0]);
        assert_eq!(solver.settings().action_increment, Some(2.5));
    }

    #[test]
    fn test_defaults_apply() {
        let text = r#"
devices = ["a"]
[[agents]]
capital_costs = [1.0]
limits = [1.0]
[[nodes]]
lower = [0.0]
upper = [1.0]
[[surrogates]]
kind = "linear"
coefficients = [1.0]
"#;
        let scenario = Scenario::parse(text).unwrap();
        assert_eq!(scenario.rounds, 10);
        assert_eq!(scenario.settings, SolverSettings::default());
        assert!(scenario.build_solver().is_ok());
        assert!(scenario.warnings().iter().any(|w| w.contains("no seed")));
    }

    #[test]
    fn test_wrong_surrogate_width_rejected() {
        let text = SCENARIO.replacen("coefficients = [1.0, 1.0]", "coefficients = [1.0]", 1);
        let scenario = Scenario::parse(&text).unwrap();
        let err = scenario.build_solver().unwrap_err();
        assert!(matches!(err, CapeqError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_unknown_surrogate_kind_rejected() {
        let text = SCENARIO.replacen("kind = \"linear\"", "kind = \"forest\"", 1);
        assert!(Scenario::parse(&text).is_err());
    }
}
