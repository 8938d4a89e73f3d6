//! Market-wide capacity bounds.
//!
//! Each node (scenario / system configuration) contributes one lower and one
//! upper capacity vector over device types. The solver only ever looks at the
//! envelope: the elementwise minimum of the lowers and the elementwise maximum
//! of the uppers.

use serde::{Deserialize, Serialize};

use crate::{CapeqError, CapeqResult};

/// Lower/upper capacity bound pair contributed by one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBound {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl NodeBound {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

/// Ordered collection of node bounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeBounds {
    nodes: Vec<NodeBound>,
}

impl NodeBounds {
    pub fn new(nodes: Vec<NodeBound>) -> Self {
        Self { nodes }
    }

    /// Single-node bounds.
    pub fn single(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self::new(vec![NodeBound::new(lower, upper)])
    }

    pub fn nodes(&self) -> &[NodeBound] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that there is at least one node and every vector has
    /// `num_devices` finite entries.
    pub fn validate(&self, num_devices: usize) -> CapeqResult<()> {
        if self.nodes.is_empty() {
            return Err(CapeqError::shape("node bounds (nodes)", 1, 0));
        }
        for (k, node) in self.nodes.iter().enumerate() {
            if node.lower.len() != num_devices {
                return Err(CapeqError::shape(
                    format!("node {k} lower bound"),
                    num_devices,
                    node.lower.len(),
                ));
            }
            if node.upper.len() != num_devices {
                return Err(CapeqError::shape(
                    format!("node {k} upper bound"),
                    num_devices,
                    node.upper.len(),
                ));
            }
            if node.lower.iter().chain(&node.upper).any(|v| v.is_nan()) {
                return Err(CapeqError::Config(format!("node {k} has NaN bounds")));
            }
        }
        Ok(())
    }

    /// Elementwise min of lowers and max of uppers across nodes.
    ///
    /// Assumes [`NodeBounds::validate`] has passed.
    pub fn aggregate(&self) -> (Vec<f64>, Vec<f64>) {
        let num_devices = self.nodes.first().map_or(0, |n| n.lower.len());
        let mut lower = vec![f64::INFINITY; num_devices];
        let mut upper = vec![f64::NEG_INFINITY; num_devices];
        for node in &self.nodes {
            for j in 0..num_devices {
                lower[j] = lower[j].min(node.lower[j]);
                upper[j] = upper[j].max(node.upper[j]);
            }
        }
        (lower, upper)
    }
}

impl From<Vec<NodeBound>> for NodeBounds {
    fn from(nodes: Vec<NodeBound>) -> Self {
        Self::new(nodes)
    }
}
