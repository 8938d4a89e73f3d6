//! # capeq-core: Capacity-Investment Equilibrium Core Types
//!
//! Data model shared by the equilibrium solver and its front ends:
//!
//! - [`AgentMatrix`]: (agents × device types) tables for installed capacity,
//!   capital cost and capacity limits
//! - [`NodeBounds`]: per-node lower/upper capacity envelopes
//! - [`Surrogate`] / [`SurrogateSet`]: black-box revenue models, one per
//!   device type, optionally differentiable
//! - [`DataScale`]: normalization factors matching surrogate training
//! - [`CapeqError`]: unified error type
//! - [`Diagnostics`]: non-fatal issues collected during a run

pub mod bounds;
pub mod diagnostics;
pub mod error;
pub mod matrix;
pub mod scale;
pub mod surrogate;

pub use bounds::{NodeBound, NodeBounds};
pub use diagnostics::{DiagnosticIssue, Diagnostics};
pub use error::{CapeqError, CapeqResult};
pub use matrix::AgentMatrix;
pub use scale::DataScale;
pub use surrogate::{
    FnSurrogate, LinearSurrogate, QuadraticSurrogate, Surrogate, SurrogateSet, SurrogateSpec,
};
