//! Progress reporting for goal runs

use colored::Colorize;
use conductor_application::ExecutionProgressNotifier;
use conductor_domain::{
    EscalationAssessment, ExecutionReport, Plan, Step, StepFailure, StepOutcome, StepStatus,
    ToolMatch, ValidationReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Reports progress with an indicatif bar over the plan's steps
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn steps_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            f(bar);
        }
    }

    fn println(&self, line: String) {
        match self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionProgressNotifier for ProgressReporter {
    fn on_candidates(&self, candidates: &[ToolMatch]) {
        let names: Vec<String> = candidates.iter().map(|m| m.tool.key().to_string()).collect();
        self.println(format!(
            "{} {} candidate tool(s): {}",
            "->".cyan(),
            candidates.len(),
            names.join(", ")
        ));
    }

    fn on_plan_generated(&self, plan: &Plan) {
        self.println(format!(
            "{} {} plan with {} step(s)",
            "->".cyan(),
            plan.tier,
            plan.steps.len()
        ));
    }

    fn on_escalation_assessed(&self, assessment: &EscalationAssessment, escalating: bool) {
        if escalating {
            let reasons: Vec<String> = assessment.reasons.iter().map(ToString::to_string).collect();
            self.println(format!("{} escalating: {}", "^".yellow(), reasons.join("; ")));
        }
    }

    fn on_validation(&self, report: &ValidationReport) {
        if report.is_valid() {
            let bar = ProgressBar::new(0);
            bar.set_style(Self::steps_style());
            bar.set_prefix("Executing");
            *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
        } else {
            self.println(format!("{} plan {}", "x".red(), report.verdict));
        }
    }

    fn on_step_start(&self, step: &Step, attempt: u32) {
        self.with_bar(|bar| {
            if attempt == 1 {
                bar.inc_length(1);
            }
            bar.set_message(format!("{} ({})", step.id, step.tool));
        });
    }

    fn on_step_retry(&self, step: &Step, attempt: u32, failure: &StepFailure, delay: Duration) {
        self.println(format!(
            "  {} {} attempt {} failed ({}), retrying in {}ms",
            "!".yellow(),
            step.id,
            attempt,
            failure,
            delay.as_millis()
        ));
    }

    fn on_step_complete(&self, outcome: &StepOutcome) {
        self.with_bar(|bar| {
            let mark = match outcome.status {
                StepStatus::Succeeded => "v".green(),
                StepStatus::Skipped => "-".dimmed(),
                _ => "x".red(),
            };
            if outcome.attempts > 0 {
                bar.inc(1);
            }
            bar.set_message(format!("{} {}", mark, outcome.step_id));
        });
    }

    fn on_plan_complete(&self, report: &ExecutionReport) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            bar.finish_with_message(format!("{} in {}ms", report.status, report.duration_ms));
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ExecutionProgressNotifier for SimpleProgress {
    fn on_plan_generated(&self, plan: &Plan) {
        eprintln!("{} {} plan ({} steps)", "->".cyan(), plan.tier, plan.steps.len());
    }

    fn on_step_complete(&self, outcome: &StepOutcome) {
        if outcome.is_success() {
            eprintln!("  {} {}", "v".green(), outcome.step_id);
        } else {
            eprintln!("  {} {} ({})", "x".red(), outcome.step_id, outcome.status);
        }
    }

    fn on_plan_complete(&self, report: &ExecutionReport) {
        eprintln!("{} {}", "=>".cyan(), report.status.to_string().bold());
    }
}
