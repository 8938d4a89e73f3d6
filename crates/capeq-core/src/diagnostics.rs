//! Diagnostics collected while running equilibrium rounds.
//!
//! Non-fatal conditions (an optimizer that hit its iteration budget, a device
//! whose feasible interval collapsed to zero width) are not errors, but the
//! caller still wants to see them next to the round's results. Each issue
//! carries a category, the agent it concerns and the round it happened in.
//! Fatal conditions surface as [`crate::CapeqError`] instead, so every
//! recorded issue is a warning.
//!
//! # Example
//!
//! ```
//! use capeq_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_agent_warning("convergence", "evolutionary search hit max generations", 1, 3);
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.issues[0].agent, Some(1));
//! ```

use serde::{Deserialize, Serialize};

/// A single diagnostic issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticIssue {
    /// Grouping key (e.g. "convergence", "saturation")
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<usize>,
}

impl DiagnosticIssue {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            agent: None,
            round: None,
        }
    }

    /// Tag the issue with the agent and round it belongs to
    pub fn for_agent(mut self, agent: usize, round: usize) -> Self {
        self.agent = Some(agent);
        self.round = Some(round);
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[warning:{}] {}", self.category, self.message)?;

        if let Some(agent) = self.agent {
            write!(f, " (agent {})", agent)?;
        }
        if let Some(round) = self.round {
            write!(f, " in round {}", round)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent_warning(&mut self, category: &str, message: &str, agent: usize, round: usize) {
        self.issues
            .push(DiagnosticIssue::new(category, message).for_agent(agent, round));
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        match self.warning_count() {
            0 => "No issues".to_string(),
            1 => "1 warning".to_string(),
            n => format!("{n} warnings"),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_agent_warning("saturation", "device 2 saturated", 1, 0);
        diag.add_agent_warning("convergence", "max generations", 0, 1);

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.issues_by_category("convergence").count(), 1);
        assert_eq!(diag.issues_by_category("bounds").count(), 0);
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_agent_warning("convergence", "restart 2 did not converge", 3, 7);

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"convergence\""));
        assert!(json.contains("\"agent\": 3"));
        assert!(json.contains("\"round\": 7"));
    }

    #[test]
    fn test_issue_display() {
        let issue = DiagnosticIssue::new("saturation", "no room left").for_agent(4, 2);
        let display = issue.to_string();
        assert!(display.contains("warning:saturation"));
        assert!(display.contains("agent 4"));
        assert!(display.contains("round 2"));
    }

    #[test]
    fn test_summary_and_merge() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");
        assert!(!diag.has_issues());

        let mut other = Diagnostics::new();
        other.add_agent_warning("saturation", "a", 0, 0);
        other.add_agent_warning("saturation", "b", 1, 0);
        diag.merge(other);
        assert_eq!(diag.summary(), "2 warnings");
        assert!(diag.has_issues());
    }
}
