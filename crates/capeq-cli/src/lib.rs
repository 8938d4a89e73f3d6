//! Library side of the `capeq` binary: argument definitions, scenario
//! loading and the JSON run report.

pub mod cli;
pub mod report;
pub mod scenario;
