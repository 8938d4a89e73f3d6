//! Dense agent × device matrices.
//!
//! Capacity, capital cost and capacity limit tables all share the same
//! (numAgents × numDeviceTypes) shape: row `i` belongs to agent `i`, column
//! `j` to device type `j`. Storage is row-major so that one agent's row is a
//! contiguous slice, which is what the per-agent optimizers consume.

use serde::{Deserialize, Serialize};

use crate::{CapeqError, CapeqResult};

/// Row-major (agents × devices) matrix of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct AgentMatrix {
    num_agents: usize,
    num_devices: usize,
    data: Vec<f64>,
}

impl AgentMatrix {
    /// All-zero matrix (the solver's `Initialized` capacity state).
    pub fn zeros(num_agents: usize, num_devices: usize) -> Self {
        Self {
            num_agents,
            num_devices,
            data: vec![0.0; num_agents * num_devices],
        }
    }

    /// Matrix with every entry equal to `value`.
    pub fn filled(num_agents: usize, num_devices: usize, value: f64) -> Self {
        Self {
            num_agents,
            num_devices,
            data: vec![value; num_agents * num_devices],
        }
    }

    /// Build from nested rows. Ragged input is a [`CapeqError::ShapeMismatch`].
    pub fn from_rows(rows: Vec<Vec<f64>>) -> CapeqResult<Self> {
        let num_agents = rows.len();
        let num_devices = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(num_agents * num_devices);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != num_devices {
                return Err(CapeqError::shape(
                    format!("matrix row {i}"),
                    num_devices,
                    row.len(),
                ));
            }
            data.extend(row);
        }
        Ok(Self {
            num_agents,
            num_devices,
            data,
        })
    }

    pub fn num_agents(&self) -> usize {
        self.num_agents
    }

    pub fn num_devices(&self) -> usize {
        self.num_devices
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_agents, self.num_devices)
    }

    pub fn get(&self, agent: usize, device: usize) -> f64 {
        self.data[agent * self.num_devices + device]
    }

    pub fn row(&self, agent: usize) -> &[f64] {
        let start = agent * self.num_devices;
        &self.data[start..start + self.num_devices]
    }

    /// Overwrite one agent's row.
    pub fn set_row(&mut self, agent: usize, values: &[f64]) -> CapeqResult<()> {
        if agent >= self.num_agents {
            return Err(CapeqError::shape("agent index", self.num_agents, agent));
        }
        if values.len() != self.num_devices {
            return Err(CapeqError::shape(
                format!("row for agent {agent}"),
                self.num_devices,
                values.len(),
            ));
        }
        let start = agent * self.num_devices;
        self.data[start..start + self.num_devices].copy_from_slice(values);
        Ok(())
    }

    /// Column `device` across all agents.
    pub fn column(&self, device: usize) -> Vec<f64> {
        (0..self.num_agents)
            .map(|agent| self.get(agent, device))
            .collect()
    }

    /// Sum of every entry (aggregate installed capacity).
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Per-device sum over all agents except `agent` (competitors' aggregate).
    pub fn others_total(&self, agent: usize) -> Vec<f64> {
        let mut totals = vec![0.0; self.num_devices];
        for other in (0..self.num_agents).filter(|&k| k != agent) {
            for (total, value) in totals.iter_mut().zip(self.row(other)) {
                *total += value;
            }
        }
        totals
    }

    /// Per-device sum over all agents.
    pub fn device_totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.num_devices];
        for agent in 0..self.num_agents {
            for (total, value) in totals.iter_mut().zip(self.row(agent)) {
                *total += value;
            }
        }
        totals
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.num_agents).map(|i| self.row(i).to_vec()).collect()
    }

    /// Fail with [`CapeqError::ShapeMismatch`] unless the shape matches.
    pub fn ensure_shape(&self, what: &str, num_agents: usize, num_devices: usize) -> CapeqResult<()> {
        if self.num_agents != num_agents {
            return Err(CapeqError::shape(
                format!("{what} (agents)"),
                num_agents,
                self.num_agents,
            ));
        }
        if self.num_devices != num_devices {
            return Err(CapeqError::shape(
                format!("{what} (devices)"),
                num_devices,
                self.num_devices,
            ));
        }
        Ok(())
    }

    /// True when every entry is finite and non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.data.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl TryFrom<Vec<Vec<f64>>> for AgentMatrix {
    type Error = CapeqError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        AgentMatrix::from_rows(rows)
    }
}

impl From<AgentMatrix> for Vec<Vec<f64>> {
    fn from(matrix: AgentMatrix) -> Self {
        matrix.to_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_others_total_excludes_agent() {
        let m = AgentMatrix::from_rows(vec![
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![5.0, 6.0],
        ])
        .unwrap();

        assert_eq!(m.others_total(0), vec![8.0, 10.0]);
        assert_eq!(m.others_total(2), vec![4.0, 6.0]);
        assert_eq!(m.device_totals(), vec![9.0, 12.0]);
        assert_eq!(m.total(), 21.0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = AgentMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, CapeqError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_set_row_checks_length() {
        let mut m = AgentMatrix::zeros(2, 3);
        m.set_row(1, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.row(1), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(0), &[0.0, 0.0, 0.0]);
        assert!(m.set_row(0, &[1.0]).is_err());
        assert!(m.set_row(5, &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_serde_as_nested_rows() {
        let m = AgentMatrix::from_rows(vec![vec![1.0, 0.5], vec![0.0, 2.0]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,0.5],[0.0,2.0]]");

        let back: AgentMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        let ragged = serde_json::from_str::<AgentMatrix>("[[1.0],[1.0,2.0]]");
        assert!(ragged.is_err());
    }

    #[test]
    fn test_ensure_shape() {
        let m = AgentMatrix::zeros(2, 3);
        assert!(m.ensure_shape("capacity", 2, 3).is_ok());
        assert!(m.ensure_shape("capacity", 3, 3).is_err());
        assert!(m.ensure_shape("capacity", 2, 2).is_err());
    }
}
