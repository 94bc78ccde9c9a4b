//! Adapters implementing engine ports.
//!
//! Following hexagonal architecture, adapters depend on the ports, not the
//! other way around.

pub mod state_arena;

pub use state_arena::{ArenaKey, StateArena};
