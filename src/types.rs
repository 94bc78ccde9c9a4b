//! Value types stored in the plan graph.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An interval estimate of cumulative reward: `(lower, average, upper)`.
///
/// Valid values satisfy `lower <= average <= upper` with every component
/// finite. Values produced by pluggable estimators are checked with
/// [`BoundedValue::check`] before they enter the plan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundedValue {
    pub lower_bound: f64,
    pub average: f64,
    pub upper_bound: f64,
}

impl BoundedValue {
    /// Create a bounded value without validation.
    pub const fn new(lower_bound: f64, average: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            average,
            upper_bound,
        }
    }

    /// A point estimate where all three channels coincide.
    pub const fn exact(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Width of the interval (`upper - lower`).
    pub fn range(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Describe the first violated invariant, if any.
    pub fn check(&self) -> Option<&'static str> {
        let channels = [self.lower_bound, self.average, self.upper_bound];
        if channels.iter().any(|v| v.is_nan()) {
            return Some("contains NaN");
        }
        if channels.iter().any(|v| v.is_infinite()) {
            return Some("contains an infinite value");
        }
        if self.lower_bound > self.average {
            return Some("lower bound is greater than the average");
        }
        if self.upper_bound < self.average {
            return Some("upper bound is less than the average");
        }
        if self.lower_bound > self.upper_bound {
            return Some("lower bound is greater than the upper bound");
        }
        None
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_none()
    }

    /// Channel-wise `self + other`.
    pub fn add(&self, other: &BoundedValue) -> Self {
        Self::new(
            self.lower_bound + other.lower_bound,
            self.average + other.average,
            self.upper_bound + other.upper_bound,
        )
    }

    /// Multiply every channel by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.lower_bound * factor,
            self.average * factor,
            self.upper_bound * factor,
        )
    }

    /// Add `offset` to every channel.
    pub fn offset(&self, offset: f64) -> Self {
        Self::new(
            self.lower_bound + offset,
            self.average + offset,
            self.upper_bound + offset,
        )
    }

    /// Channel-wise maximum.
    pub fn max(&self, other: &BoundedValue) -> Self {
        Self::new(
            self.lower_bound.max(other.lower_bound),
            self.average.max(other.average),
            self.upper_bound.max(other.upper_bound),
        )
    }
}

impl From<(f64, f64, f64)> for BoundedValue {
    fn from((lower, average, upper): (f64, f64, f64)) -> Self {
        Self::new(lower, average, upper)
    }
}

impl fmt::Display for BoundedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}, {:.3}, {:.3}]",
            self.lower_bound, self.average, self.upper_bound
        )
    }
}

/// Per-state planning information.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateInfo {
    /// Whether the subgraph below this state is fully resolved.
    pub subplan_is_complete: bool,
    pub cumulative_reward_estimate: BoundedValue,
}

/// Per state-action planning information, aggregated over outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionInfo {
    pub subplan_is_complete: bool,
    pub cumulative_reward_estimate: BoundedValue,
}

/// Edge-local data for one stochastic outcome of an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionInfo {
    /// Likelihood of the outcome, in `(0, 1]`.
    pub probability: f64,
    /// Immediate reward collected along the transition.
    pub transition_utility_value: f64,
}

impl StateTransitionInfo {
    pub fn new(probability: f64, transition_utility_value: f64) -> Self {
        Self {
            probability,
            transition_utility_value,
        }
    }
}
