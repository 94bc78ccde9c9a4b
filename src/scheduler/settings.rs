//! Planner configuration.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, planner::SelectionMode};

/// Settings applied to every iteration of a scheduler.
///
/// Builder-style, and (de)serializable so it can be kept in a JSON file.
///
/// # Examples
///
/// ```
/// use boundplan::{planner::SelectionMode, scheduler::PlannerSettings};
///
/// let settings = PlannerSettings::new()
///     .with_state_expansion_budget(8)
///     .with_selection_mode(SelectionMode::Parallel)
///     .with_discount_factor(0.95);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Frontier states expanded per iteration, at least 1
    pub state_expansion_budget_per_iteration: usize,
    /// Traversal strategy of the selector
    pub selection_mode: SelectionMode,
    /// Weight of successor values, in `(0, 1]`
    pub discount_factor: f64,
    /// Stop growing the graph once it holds this many states
    pub max_plan_size: Option<usize>,
}

impl PlannerSettings {
    pub fn new() -> Self {
        Self {
            state_expansion_budget_per_iteration: 1,
            selection_mode: SelectionMode::default(),
            discount_factor: 1.0,
            max_plan_size: None,
        }
    }

    pub fn with_state_expansion_budget(mut self, budget: usize) -> Self {
        self.state_expansion_budget_per_iteration = budget;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_discount_factor(mut self, discount_factor: f64) -> Self {
        self.discount_factor = discount_factor;
        self
    }

    pub fn with_max_plan_size(mut self, max_plan_size: usize) -> Self {
        self.max_plan_size = Some(max_plan_size);
        self
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.state_expansion_budget_per_iteration == 0 {
            return Err(Error::InvalidConfiguration {
                message: "state expansion budget must be at least 1".to_string(),
            });
        }
        if !(self.discount_factor > 0.0 && self.discount_factor <= 1.0) {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "discount factor must be in (0, 1], got {}",
                    self.discount_factor
                ),
            });
        }
        if self.max_plan_size == Some(0) {
            return Err(Error::InvalidConfiguration {
                message: "max plan size must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Load and validate settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::InvalidConfiguration {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let settings: Self =
            serde_json::from_str(&contents).map_err(|e| Error::InvalidConfiguration {
                message: format!("cannot parse {}: {e}", path.display()),
            })?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self::new()
    }
}
