//! Planner configuration shared across commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::{PlannerSettings, SelectionMode};

/// Selection strategy as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectionArg {
    Sequential,
    Parallel,
}

impl From<SelectionArg> for SelectionMode {
    fn from(arg: SelectionArg) -> Self {
        match arg {
            SelectionArg::Sequential => SelectionMode::Sequential,
            SelectionArg::Parallel => SelectionMode::Parallel,
        }
    }
}

/// Planner flags; each one overrides the settings file
#[derive(Args, Debug, Clone, Default)]
pub struct PlannerArgs {
    /// JSON settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// States expanded per iteration
    #[arg(long, short = 'b')]
    pub budget: Option<usize>,

    /// Selection strategy
    #[arg(long, value_enum)]
    pub selection: Option<SelectionArg>,

    /// Discount factor in (0, 1]
    #[arg(long)]
    pub discount: Option<f64>,

    /// Stop growing the plan at this many states
    #[arg(long)]
    pub max_plan_size: Option<usize>,

    /// Upper limit on iterations run by the command
    #[arg(long, default_value_t = 100_000)]
    pub max_iterations: usize,
}

impl PlannerArgs {
    /// Load the settings file (or defaults) and apply flag overrides.
    pub fn to_settings(&self) -> Result<PlannerSettings> {
        let mut settings = match &self.settings {
            Some(path) => PlannerSettings::from_json_file(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => PlannerSettings::default(),
        };
        if let Some(budget) = self.budget {
            settings = settings.with_state_expansion_budget(budget);
        }
        if let Some(selection) = self.selection {
            settings = settings.with_selection_mode(selection.into());
        }
        if let Some(discount) = self.discount {
            settings = settings.with_discount_factor(discount);
        }
        if let Some(max) = self.max_plan_size {
            settings = settings.with_max_plan_size(max);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn flags_override_the_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"state_expansion_budget_per_iteration": 4, "discount_factor": 0.9}}"#
        )
        .unwrap();

        let args = PlannerArgs {
            settings: Some(file.path().to_path_buf()),
            selection: Some(SelectionArg::Parallel),
            discount: Some(0.5),
            ..PlannerArgs::default()
        };
        let settings = args.to_settings().unwrap();
        assert_eq!(settings.state_expansion_budget_per_iteration, 4);
        assert_eq!(settings.selection_mode, SelectionMode::Parallel);
        assert_eq!(settings.discount_factor, 0.5);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let args = PlannerArgs {
            budget: Some(0),
            ..PlannerArgs::default()
        };
        assert!(args.to_settings().is_err());
    }
}
