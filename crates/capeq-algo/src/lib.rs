//! # capeq-algo: Equilibrium Search
//!
//! Approximate capacity-investment equilibria by diagonalization: agents take
//! turns choosing a best-response capacity vector against the competitors'
//! latest decisions until aggregate capacity settles.
//!
//! ## Modules
//!
//! - [`objective`]: net-cost objective and surrogate profit/gradient pair
//! - [`region`]: per-agent feasible boxes
//! - [`optimizer`]: evolutionary, grid and gradient best responses
//! - [`solver`]: the round-robin [`DiagonalizedSolver`]
//! - [`history`]: per-agent decision traces and round reports
//! - [`interrupt`]: cooperative cancellation
//!
//! ## Example
//!
//! ```no_run
//! use capeq_algo::{DiagonalizedSolver, Interrupt, SolverSettings};
//! use capeq_core::{AgentMatrix, LinearSurrogate, NodeBounds, SurrogateSet};
//!
//! let mut solver = DiagonalizedSolver::new(
//!     AgentMatrix::filled(2, 2, 1.0),
//!     AgentMatrix::filled(2, 2, 10.0),
//!     NodeBounds::single(vec![0.0, 0.0], vec![10.0, 10.0]),
//!     SurrogateSet::from_models(vec![LinearSurrogate::sum(2), LinearSurrogate::sum(2)]),
//!     SolverSettings { seed: Some(7), ..Default::default() },
//! )?;
//! solver.iterate(3, &Interrupt::new())?;
//! println!("{:?}", solver.agent_decisions());
//! # Ok::<(), capeq_core::CapeqError>(())
//! ```

pub mod history;
pub mod interrupt;
pub mod objective;
pub mod optimizer;
pub mod region;
pub mod solver;

pub use history::{AgentHistory, HistoryEntry, RoundReport};
pub use interrupt::Interrupt;
pub use objective::{
    profit_objective, surrogate_profit_and_gradient, AgentObjective, Regularization,
};
pub use optimizer::{
    AgentDecision, AgentProblem, BestResponse, EvolutionConfig, EvolutionarySearch,
    GradientConfig, GradientSearch, GridConfig, GridSearch, Strategy,
};
pub use region::{FeasibleRegion, RegionInputs};
pub use solver::{DiagonalizedSolver, SolverSettings};
