//! Per-agent decision history and per-round reports.

use capeq_core::Diagnostics;
use serde::{Deserialize, Serialize};

use crate::optimizer::AgentDecision;

/// One agent's outcome in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub decision: Vec<f64>,
    pub objective: f64,
    pub converged: bool,
}

impl From<&AgentDecision> for HistoryEntry {
    fn from(d: &AgentDecision) -> Self {
        Self {
            decision: d.decision.clone(),
            objective: d.objective,
            converged: d.converged,
        }
    }
}

/// Append-only record of an agent's best responses, one entry per completed
/// best response.
///
/// Entries line up with solver rounds only while no round has been aborted.
/// Agents that finished before an interrupt or failure keep that entry even
/// though the round is not counted, so their history can run ahead of
/// [`DiagonalizedSolver::iteration_count`](crate::DiagonalizedSolver::iteration_count)
/// from then on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentHistory {
    entries: Vec<HistoryEntry>,
}

impl AgentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Decisions stacked by round (rounds × devices).
    pub fn decisions(&self) -> Vec<Vec<f64>> {
        self.entries.iter().map(|e| e.decision.clone()).collect()
    }

    pub fn objectives(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.objective).collect()
    }

    /// Capacity of one device type across rounds.
    pub fn device_trajectory(&self, device: usize) -> Vec<f64> {
        self.entries
            .iter()
            .filter_map(|e| e.decision.get(device).copied())
            .collect()
    }

    /// Largest absolute change between the last two decisions.
    pub fn last_change(&self) -> Option<f64> {
        let n = self.entries.len();
        if n < 2 {
            return None;
        }
        let prev = &self.entries[n - 2].decision;
        let last = &self.entries[n - 1].decision;
        Some(
            prev.iter()
                .zip(last)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max),
        )
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Summary of one completed diagonalization round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundReport {
    /// Round number, starting at 1
    pub round: usize,
    /// Sum of the capacity matrix after the round
    pub total_capacity: f64,
    /// Objective reported by each agent's optimizer
    pub objectives: Vec<f64>,
    pub diagnostics: Diagnostics,
    pub elapsed_ms: f64,
}

impl RoundReport {
    /// Agents whose search did not converge this round.
    pub fn unconverged(&self) -> Vec<usize> {
        self.diagnostics
            .issues_by_category("convergence")
            .filter_map(|issue| issue.agent)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(decision: Vec<f64>, objective: f64) -> HistoryEntry {
        HistoryEntry {
            decision,
            objective,
            converged: true,
        }
    }

    #[test]
    fn test_history_accessors() {
        let mut h = AgentHistory::new();
        h.push(entry(vec![1.0, 2.0], -3.0));
        h.push(entry(vec![1.5, 1.0], -4.0));

        assert_eq!(h.len(), 2);
        assert_eq!(h.decisions(), vec![vec![1.0, 2.0], vec![1.5, 1.0]]);
        assert_eq!(h.objectives(), vec![-3.0, -4.0]);
        assert_eq!(h.device_trajectory(1), vec![2.0, 1.0]);
        assert_eq!(h.last_change(), Some(1.0));
    }

    #[test]
    fn test_last_change_needs_two_rounds() {
        let mut h = AgentHistory::new();
        assert_eq!(h.last_change(), None);
        h.push(entry(vec![1.0], 0.0));
        assert_eq!(h.last_change(), None);
    }

    #[test]
    fn test_round_report_unconverged() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_agent_warning("convergence", "did not converge", 1, 2);
        diagnostics.add_agent_warning("saturation", "device 0 saturated", 0, 2);
        let report = RoundReport {
            round: 2,
            diagnostics,
            ..RoundReport::default()
        };
        assert_eq!(report.unconverged(), vec![1]);
    }

    #[test]
    fn test_history_serializes() {
        let mut h = AgentHistory::new();
        h.push(entry(vec![0.5], 1.0));
        let json = serde_json::to_string(&h).unwrap();
        let back: AgentHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
