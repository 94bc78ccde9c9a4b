//! Plan command - Plan the counter domain from one root state

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::{
    BoundedValue, PlanCompletion,
    adapters::StateArena,
    cli::{
        commands::{counter_scheduler, run_until},
        config::PlannerArgs,
        output::{ProgressObserver, format_number, print_kv, print_section},
    },
};

#[derive(Parser, Debug)]
#[command(about = "Plan how to count up to a goal")]
pub struct PlanArgs {
    /// Value to count up to
    #[arg(long, short = 'g')]
    pub goal: i64,

    /// Starting value
    #[arg(long, short = 'r', default_value_t = 0)]
    pub root: i64,

    /// When the request counts as complete
    /// (resolved, immediate, manual, tolerance:X, size:N, time:MS)
    #[arg(long, default_value = "resolved")]
    pub until: PlanCompletion,

    /// Let increments of 2 and 3 slip one short
    #[arg(long)]
    pub stochastic: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub planner: PlannerArgs,
}

/// Result of a `plan` run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub goal: i64,
    pub root: i64,
    pub completion: String,
    pub iterations: usize,
    pub complete: bool,
    pub plan_size: usize,
    pub root_estimate: Option<BoundedValue>,
    pub root_complete: bool,
    pub best_action: Option<String>,
    pub planning_time_ms: f64,
}

pub fn execute(args: PlanArgs) -> Result<()> {
    let settings = args.planner.to_settings()?;
    let arena = Arc::new(StateArena::new());
    let scheduler = counter_scheduler(Arc::clone(&arena), args.goal, args.stochastic, settings)?;

    let observer = if args.json {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new()?
    };
    scheduler.add_observer(Box::new(observer));

    let root = arena.insert(args.root);
    let request = scheduler.request_plan(root, args.until);
    let iterations = run_until(&scheduler, &request, args.planner.max_iterations, |r| {
        r.is_complete()
    })?;

    let plan = request.plan();
    let root_info = plan.as_ref().and_then(|p| p.root_info());
    let summary = PlanSummary {
        goal: args.goal,
        root: args.root,
        completion: args.until.to_string(),
        iterations,
        complete: request.is_complete(),
        plan_size: plan.as_ref().map_or(0, |p| p.size()),
        root_estimate: root_info.map(|i| i.cumulative_reward_estimate),
        root_complete: root_info.is_some_and(|i| i.subplan_is_complete),
        best_action: plan
            .as_ref()
            .and_then(|p| p.root().and_then(|r| p.try_get_optimal_action(r)))
            .map(|a| a.to_string()),
        planning_time_ms: request.planning_time().as_secs_f64() * 1000.0,
    };
    let destroyed = scheduler.dispose();
    info!(destroyed, "plan finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &PlanSummary) {
    print_section("Plan Summary");
    print_kv("Goal", &summary.goal.to_string());
    print_kv("Root", &summary.root.to_string());
    print_kv("Completion", &summary.completion);
    print_kv("Request complete", &summary.complete.to_string());
    print_kv("Iterations", &format_number(summary.iterations));
    print_kv("Plan size", &format_number(summary.plan_size));
    if let Some(estimate) = summary.root_estimate {
        print_kv("Root bounds", &estimate.to_string());
    }
    print_kv("Root complete", &summary.root_complete.to_string());
    print_kv(
        "Best action",
        summary.best_action.as_deref().unwrap_or("(none)"),
    );
    print_kv(
        "Planning time",
        &format!("{:.1} ms", summary.planning_time_ms),
    );
}
