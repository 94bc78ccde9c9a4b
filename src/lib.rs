//! Anytime, incremental forward-search planner with bounded value estimates
//!
//! This crate provides:
//! - A plan graph of states, actions and probabilistic transitions
//! - An iteration loop of selection, parallel expansion, evaluation and
//!   layered backpropagation of `(lower, average, upper)` bounds
//! - A scheduler that runs iterations on one worker thread behind completion handles
//! - A shared read view of the plan and a plan executor that acts on it
//! - An in-memory state store and an integer counter demo domain

pub mod adapters;
pub mod cli;
pub mod domains;
pub mod error;
pub mod executor;
pub mod graph;
pub mod identifiers;
pub mod plan;
pub mod planner;
pub mod ports;
pub mod scheduler;
pub mod types;

pub use error::{Error, Result};
pub use executor::{ActionProgress, ActionRunner, PlanExecutionStatus, PlanExecutor};
pub use plan::Plan;
pub use planner::{IterationReport, SelectionMode};
pub use scheduler::{
    JobHandle, PlanCompletion, PlanRequest, PlanRequestStatus, PlannerScheduler, PlannerSettings,
};
pub use types::{ActionInfo, BoundedValue, StateInfo, StateTransitionInfo};
