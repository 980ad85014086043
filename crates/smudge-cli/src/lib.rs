//! Scenario replay front-end for `smudge-core`.

pub mod cli;
pub mod commands;
pub mod scenario;

pub use scenario::{ClassSpec, Report, Runner, Scenario, ScenarioError, Step};
