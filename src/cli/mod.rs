//! Command-line interface for the boundplan planner
//!
//! The commands plan and simulate the integer counter domain, which is the
//! quickest way to watch the planner's bounds converge.

pub mod commands;
pub mod config;
pub mod output;
