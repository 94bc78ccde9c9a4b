//! Integer counter domain.
//!
//! The state is a single integer. Actions add 1, 2 or 3 and earn the amount
//! added. The episode ends once the counter reaches the goal: landing exactly
//! on it earns 0, overshooting costs 100.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ports::{
        ActionEffects, ActionGenerator, ActionOutcome, CumulativeRewardEstimator,
        TerminationEvaluator,
    },
    types::BoundedValue,
};

/// Reward for overshooting the goal.
pub const OVERSHOOT_PENALTY: f64 = -100.0;

/// Add `n` to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Increment(pub u8);

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

/// Generates the three increments of a counter state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterActions {
    /// Probability that an increment of 2 or 3 falls one short.
    slip_probability: f64,
}

impl CounterActions {
    /// Every increment lands exactly.
    pub fn deterministic() -> Self {
        Self {
            slip_probability: 0.0,
        }
    }

    /// Increments of 2 and 3 fall one short with `slip_probability`.
    pub fn slippery(slip_probability: f64) -> Self {
        Self { slip_probability }
    }

    pub fn slip_probability(&self) -> f64 {
        self.slip_probability
    }
}

impl Default for CounterActions {
    fn default() -> Self {
        Self::deterministic()
    }
}

impl ActionGenerator<i64> for CounterActions {
    type ActionKey = Increment;

    fn generate(&self, state: &i64) -> Vec<ActionEffects<Increment, i64>> {
        (1..=3u8)
            .map(|amount| {
                let step = i64::from(amount);
                let outcomes = if amount == 1 || self.slip_probability <= 0.0 {
                    vec![ActionOutcome::certain(state + step, f64::from(amount))]
                } else {
                    vec![
                        ActionOutcome::new(
                            state + step,
                            1.0 - self.slip_probability,
                            f64::from(amount),
                        ),
                        ActionOutcome::new(
                            state + step - 1,
                            self.slip_probability,
                            f64::from(amount - 1),
                        ),
                    ]
                };
                ActionEffects::new(Increment(amount), outcomes)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "CounterActions"
    }
}

/// Bounds the remaining reward by the distance to the goal: `(0, 0, goal - s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountToEstimator {
    goal: i64,
}

impl CountToEstimator {
    pub fn new(goal: i64) -> Self {
        Self { goal }
    }
}

impl CumulativeRewardEstimator<i64> for CountToEstimator {
    fn evaluate(&self, state: &i64) -> BoundedValue {
        BoundedValue::new(0.0, 0.0, (self.goal - state).max(0) as f64)
    }

    fn name(&self) -> &str {
        "CountToEstimator"
    }
}

/// Ends the episode at or past the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountToTermination {
    goal: i64,
}

impl CountToTermination {
    pub fn new(goal: i64) -> Self {
        Self { goal }
    }
}

impl TerminationEvaluator<i64> for CountToTermination {
    fn is_terminal(&self, state: &i64) -> Option<f64> {
        match state.cmp(&self.goal) {
            std::cmp::Ordering::Less => None,
            std::cmp::Ordering::Equal => Some(0.0),
            std::cmp::Ordering::Greater => Some(OVERSHOOT_PENALTY),
        }
    }

    fn name(&self) -> &str {
        "CountToTermination"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_rewards_landing_on_the_goal() {
        let termination = CountToTermination::new(100);
        assert_eq!(termination.is_terminal(&100), Some(0.0));
        assert_eq!(termination.is_terminal(&101), Some(-100.0));
        assert_eq!(termination.is_terminal(&50), None);
    }

    #[test]
    fn deterministic_increments_are_certain() {
        let effects = CounterActions::deterministic().generate(&7);
        assert_eq!(effects.len(), 3);
        for (effect, amount) in effects.iter().zip(1..) {
            assert_eq!(effect.action_key, Increment(amount));
            assert_eq!(
                effect.outcomes,
                vec![ActionOutcome::certain(7 + i64::from(amount), f64::from(amount))]
            );
        }
    }

    #[test]
    fn slippery_increments_sum_to_one() {
        let effects = CounterActions::slippery(0.25).generate(&0);
        assert_eq!(effects[0].outcomes.len(), 1);
        for effect in &effects[1..] {
            let total: f64 = effect.outcomes.iter().map(|o| o.probability).sum();
            assert_eq!(total, 1.0);
            assert_eq!(effect.outcomes[1].state_data, i64::from(effect.action_key.0) - 1);
        }
    }

    #[test]
    fn estimator_bounds_by_distance() {
        let estimator = CountToEstimator::new(10);
        assert_eq!(estimator.evaluate(&4), BoundedValue::new(0.0, 0.0, 6.0));
        assert_eq!(estimator.evaluate(&12), BoundedValue::new(0.0, 0.0, 0.0));
    }
}
