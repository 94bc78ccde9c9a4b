//! Scheduling of planning iterations, plan requests and their settings.

pub mod job;
pub mod planner_scheduler;
pub mod request;
pub mod settings;

pub use job::JobHandle;
pub use planner_scheduler::PlannerScheduler;
pub use request::{PlanCompletion, PlanRequest, PlanRequestStatus};
pub use settings::PlannerSettings;
