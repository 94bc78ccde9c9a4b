//! Simulate command - Plan, act, observe and re-root until the episode ends

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    ActionProgress, PlanCompletion, PlanExecutor,
    adapters::StateArena,
    cli::{
        commands::{STOCHASTIC_SLIP, counter_scheduler, run_until},
        config::PlannerArgs,
        output::{ProgressObserver, print_kv, print_section},
    },
    domains::counter::{CountToTermination, CounterActions, Increment},
    ports::{ActionGenerator, ActionOutcome, TerminationEvaluator},
};

#[derive(Parser, Debug)]
#[command(about = "Count up to a goal, re-planning after every step")]
pub struct SimulateArgs {
    /// Value to count up to
    #[arg(long, short = 'g')]
    pub goal: i64,

    /// Starting value
    #[arg(long, short = 'r', default_value_t = 0)]
    pub root: i64,

    /// When the plan is good enough to act on
    #[arg(long, default_value = "resolved")]
    pub until: PlanCompletion,

    /// Let increments of 2 and 3 slip one short
    #[arg(long)]
    pub stochastic: bool,

    /// Random seed for sampling outcomes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Upper limit on executed actions
    #[arg(long, default_value_t = 10_000)]
    pub max_steps: usize,

    /// Print the trajectory as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub planner: PlannerArgs,
}

/// One executed action.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub from: i64,
    pub action: String,
    pub to: i64,
    pub reward: f64,
}

/// Result of a `simulate` run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub goal: i64,
    pub seed: u64,
    pub steps: Vec<Step>,
    pub final_state: i64,
    pub total_reward: f64,
    pub iterations: usize,
}

pub fn execute(args: SimulateArgs) -> Result<()> {
    let settings = args.planner.to_settings()?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let arena = Arc::new(StateArena::new());
    let scheduler = counter_scheduler(Arc::clone(&arena), args.goal, args.stochastic, settings)?;
    if !args.json {
        scheduler.add_observer(Box::new(ProgressObserver::new()?));
    }
    let actions = if args.stochastic {
        CounterActions::slippery(STOCHASTIC_SLIP)
    } else {
        CounterActions::deterministic()
    };
    let termination = CountToTermination::new(args.goal);

    let chosen: Arc<Mutex<Option<Increment>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&chosen);
    let runner = move |action: Increment| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(action);
        ActionProgress::Completed
    };
    let mut executor = PlanExecutor::new(runner, args.until);

    let mut state = args.root;
    let root = arena.insert(state);
    executor.update_current_state(root);
    let request = scheduler.request_plan(root, args.until);

    let mut steps = Vec::new();
    let mut total_reward = 0.0;
    let mut iterations = 0;
    while steps.len() < args.max_steps {
        if let Some(reward) = termination.is_terminal(&state) {
            total_reward += reward;
            break;
        }

        iterations += run_until(&scheduler, &request, args.planner.max_iterations, |r| {
            if let Some(plan) = r.plan() {
                executor.set_plan(plan);
            }
            executor.ready_to_act()
        })?;

        executor.execute_next_action(None)?;
        let Some(action) = chosen.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            bail!("no action was executed from state {state}");
        };
        let outcome = sample_outcome(&mut rng, &actions, state, action)
            .with_context(|| format!("action {action} has no outcomes from state {state}"))?;

        debug!(from = state, %action, to = outcome.state_data, "step");
        steps.push(Step {
            from: state,
            action: action.to_string(),
            to: outcome.state_data,
            reward: outcome.utility,
        });
        total_reward += outcome.utility;
        state = outcome.state_data;

        let key = arena.insert(state);
        executor.update_current_state(key);
        scheduler.update_plan_request_root_state(key).complete()?;
    }

    let destroyed = scheduler.dispose();
    info!(destroyed, steps = steps.len(), "simulation finished");

    let summary = SimulationSummary {
        goal: args.goal,
        seed,
        steps,
        final_state: state,
        total_reward,
        iterations,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Draw the outcome of `action` from `state` by its probability.
fn sample_outcome<R: Rng>(
    rng: &mut R,
    actions: &CounterActions,
    state: i64,
    action: Increment,
) -> Option<ActionOutcome<i64>> {
    let effects = actions
        .generate(&state)
        .into_iter()
        .find(|effects| effects.action_key == action)?;
    let total: f64 = effects.outcomes.iter().map(|o| o.probability).sum();
    let mut threshold = rng.random::<f64>() * total;
    let last = effects.outcomes.last().cloned();
    for outcome in effects.outcomes {
        threshold -= outcome.probability;
        if threshold < 0.0 {
            return Some(outcome);
        }
    }
    last
}

fn print_summary(summary: &SimulationSummary) {
    print_section("Simulation");
    for step in &summary.steps {
        println!(
            "  {:>6} {:>3} -> {:<6} ({:+})",
            step.from, step.action, step.to, step.reward
        );
    }
    println!();
    print_kv("Goal", &summary.goal.to_string());
    print_kv("Seed", &summary.seed.to_string());
    print_kv("Final state", &summary.final_state.to_string());
    print_kv("Total reward", &summary.total_reward.to_string());
    print_kv("Iterations", &summary.iterations.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_follows_outcome_probabilities() {
        let mut rng = StdRng::seed_from_u64(42);
        let actions = CounterActions::slippery(0.5);
        let mut slips = 0;
        for _ in 0..1000 {
            let outcome = sample_outcome(&mut rng, &actions, 0, Increment(3)).unwrap();
            if outcome.state_data == 2 {
                slips += 1;
            } else {
                assert_eq!(outcome.state_data, 3);
            }
        }
        assert!((400..600).contains(&slips), "slips = {slips}");
    }

    #[test]
    fn certain_actions_always_land() {
        let mut rng = StdRng::seed_from_u64(7);
        let actions = CounterActions::slippery(0.5);
        for _ in 0..20 {
            let outcome = sample_outcome(&mut rng, &actions, 5, Increment(1)).unwrap();
            assert_eq!(outcome.state_data, 6);
        }
    }
}
