//! Unified error type for the capeq workspace
//!
//! Every fallible operation in the solver returns [`CapeqResult`]. Errors are
//! grouped by the kind of failure a caller can react to: malformed inputs
//! (shape, configuration), a misbehaving surrogate model, an invalid search
//! box, or a user interrupt. Per-agent failures are wrapped in
//! [`CapeqError::Agent`] by the diagonalization solver so the caller knows
//! which agent and round failed.
//!
//! Search non-convergence is deliberately *not* an error: optimizers return
//! their best point together with a `converged` flag.

use thiserror::Error;

/// Unified error type for all capeq operations.
#[derive(Error, Debug)]
pub enum CapeqError {
    /// An input matrix or vector has the wrong length.
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Lower bound exceeds upper bound after clamping (strict mode only).
    #[error("Degenerate bounds for device {device}: lower {lower} > upper {upper}")]
    DegenerateBounds { device: usize, lower: f64, upper: f64 },

    /// A surrogate model returned an invalid prediction or gradient.
    #[error("Surrogate failure for device {device}: {reason}")]
    SurrogateFailure { device: usize, reason: String },

    /// The round was cancelled before every agent was processed.
    #[error("Interrupted during round {round} after {agents_completed} agent(s)")]
    Interrupted { round: usize, agents_completed: usize },

    /// A per-agent failure, annotated with the agent index and round.
    #[error("Agent {agent} failed in round {round}: {source}")]
    Agent {
        agent: usize,
        round: usize,
        #[source]
        source: Box<CapeqError>,
    },

    /// Invalid optimizer or scenario configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (scenario and report files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using CapeqError.
pub type CapeqResult<T> = Result<T, CapeqError>;

impl CapeqError {
    /// Build a [`CapeqError::ShapeMismatch`].
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        CapeqError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Attach agent/round context. Already-annotated errors and interrupts
    /// pass through unchanged.
    pub fn for_agent(self, agent: usize, round: usize) -> Self {
        match self {
            err @ (CapeqError::Agent { .. } | CapeqError::Interrupted { .. }) => err,
            other => CapeqError::Agent {
                agent,
                round,
                source: Box::new(other),
            },
        }
    }

    /// True when this error (or the error it wraps) is a user interrupt.
    pub fn is_interrupt(&self) -> bool {
        match self {
            CapeqError::Interrupted { .. } => true,
            CapeqError::Agent { source, .. } => source.is_interrupt(),
            _ => false,
        }
    }

    /// The innermost error, skipping agent context.
    pub fn root(&self) -> &CapeqError {
        match self {
            CapeqError::Agent { source, .. } => source.root(),
            other => other,
        }
    }
}

// argmin reports failures as anyhow errors; surrogate failures raised inside a
// cost or gradient evaluation come back out through this conversion intact.
impl From<anyhow::Error> for CapeqError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CapeqError>() {
            Ok(inner) => inner,
            Err(other) => CapeqError::Other(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CapeqError {
    fn from(err: serde_json::Error) -> Self {
        CapeqError::Parse(err.to_string())
    }
}
