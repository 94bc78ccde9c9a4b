//! Output formatting and progress reporting for CLI

use indicatif::{ProgressBar, ProgressStyle};

use crate::{Error, IterationReport, Result, ports::PlannerObserver};

/// Spinner that follows the plan size and root bounds while planning.
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
}

impl ProgressObserver {
    pub fn new() -> Result<Self> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} iterations ({msg})")
                .map_err(|e| Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?,
        );
        Ok(Self {
            progress_bar: Some(pb),
        })
    }

    /// An observer that draws nothing.
    pub fn hidden() -> Self {
        Self { progress_bar: None }
    }
}

fn describe(report: &IterationReport) -> String {
    match report.root_estimate {
        Some(estimate) => format!("{} states, root {estimate}", report.plan_size),
        None => format!("{} states", report.plan_size),
    }
}

impl PlannerObserver for ProgressObserver {
    fn on_iteration_complete(&mut self, report: &IterationReport) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(report.iteration as u64);
            pb.set_message(describe(report));
        }
        Ok(())
    }

    fn on_request_complete(&mut self, report: &IterationReport) -> Result<()> {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_with_message(describe(report));
        }
        Ok(())
    }
}

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

/// Format a number with thousands separators
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i.is_multiple_of(3) {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:20} {}", format!("{}:", key), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn hidden_observer_accepts_reports() {
        let mut observer = ProgressObserver::hidden();
        let report = IterationReport {
            plan_size: 3,
            ..IterationReport::default()
        };
        assert!(observer.on_iteration_complete(&report).is_ok());
        assert!(observer.on_request_complete(&report).is_ok());
    }
}
