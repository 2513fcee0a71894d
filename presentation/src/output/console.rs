//! Console output formatter for runs, validation reports and the catalog

use colored::Colorize;
use conductor_application::{EscalationDecision, RunGoalOutput};
use conductor_domain::{
    ConfigIssue, ExecutionReport, PlanStatus, StepOutcome, StepStatus, Tool, ToolMatch,
    ValidationReport,
};
use serde::Serialize;

/// Formats engine results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format a complete goal run
    pub fn format_run(goal: &str, result: &RunGoalOutput) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Conductor Run"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Goal:".cyan().bold(), goal));
        output.push_str(&format!(
            "{} {} ({}, confidence {:.2})\n",
            "Plan:".cyan().bold(),
            result.plan_id,
            result.plan.tier,
            result.plan.confidence
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Escalation:".cyan().bold(),
            Self::escalation_line(result)
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Status:".cyan().bold(),
            Self::status_label(result.status)
        ));

        if result.status == PlanStatus::Rejected {
            output.push_str(&Self::format_validation(&result.validation));
        } else {
            output.push_str(&Self::section_header("Steps"));
            for step in &result.step_results {
                output.push_str(&Self::step_line(step));
            }
        }

        if let Some(error) = &result.error {
            output.push_str(&format!("\n{} {}\n", "Error:".red().bold(), error));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format the execution of an already validated plan
    pub fn format_report(report: &ExecutionReport) -> String {
        let mut output = Self::section_header("Execution");
        output.push_str(&format!(
            "{} {} ({}ms)\n",
            "Status:".cyan().bold(),
            Self::status_label(report.status),
            report.duration_ms
        ));
        for step in &report.steps {
            output.push_str(&Self::step_line(step));
        }
        output
    }

    /// Format a validation report
    pub fn format_validation(report: &ValidationReport) -> String {
        let mut output = Self::section_header("Validation");
        let verdict = if report.is_valid() {
            report.verdict.as_str().green().bold()
        } else {
            report.verdict.as_str().red().bold()
        };
        output.push_str(&format!("{} {}\n", "Verdict:".bold(), verdict));
        for violation in &report.violations {
            output.push_str(&format!("  {} {}\n", "x".red(), violation));
        }
        output
    }

    /// Format discovery matches
    pub fn format_matches(matches: &[ToolMatch]) -> String {
        if matches.is_empty() {
            return format!("{}\n", "No tools matched.".yellow());
        }
        let mut output = Self::section_header("Candidate tools");
        for m in matches {
            output.push_str(&format!(
                "  {:.3}  {}  {}\n",
                m.similarity,
                m.tool.key().to_string().bold(),
                m.tool.scopes.join(", ").dimmed()
            ));
            if !m.tool.description.is_empty() {
                output.push_str(&format!("{}\n", Self::indent(&m.tool.description, "         ")));
            }
        }
        output
    }

    /// Format a catalog listing
    pub fn format_tools<'a>(tools: impl IntoIterator<Item = &'a Tool>) -> String {
        let mut output = Self::section_header("Tools");
        for tool in tools {
            let key = tool.key().to_string();
            let name = if tool.is_deprecated() {
                format!("{} (deprecated)", key).dimmed()
            } else {
                key.bold()
            };
            output.push_str(&format!(
                "  {}  [{}]  {} invocations\n",
                name,
                tool.scopes.join(", "),
                tool.stats.invocations
            ));
        }
        output
    }

    /// Format configuration issues
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        if issues.is_empty() {
            return format!("{}\n", "Configuration OK".green());
        }
        issues
            .iter()
            .map(|issue| {
                if issue.is_error() {
                    format!("  {} {}\n", "x".red(), issue)
                } else {
                    format!("  {} {}\n", "!".yellow(), issue)
                }
            })
            .collect()
    }

    /// Format any serializable result as pretty JSON
    pub fn format_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    fn escalation_line(result: &RunGoalOutput) -> String {
        let reasons = result
            .assessment
            .reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        match result.escalation {
            EscalationDecision::NotNeeded => "not needed".to_string(),
            EscalationDecision::Escalated => format!("escalated ({})", reasons),
            EscalationDecision::NotPermitted => format!("not permitted ({})", reasons),
            EscalationDecision::AlreadyEscalated => "already escalated".to_string(),
        }
    }

    fn status_label(status: PlanStatus) -> String {
        let label = status.to_string();
        match status {
            PlanStatus::Completed => label.green().bold().to_string(),
            PlanStatus::PartiallyCompleted => label.yellow().bold().to_string(),
            _ => label.red().bold().to_string(),
        }
    }

    fn step_line(step: &StepOutcome) -> String {
        let marker = match step.status {
            StepStatus::Succeeded => "v".green(),
            StepStatus::Skipped => "-".dimmed(),
            StepStatus::Blocked | StepStatus::Cancelled => "~".yellow(),
            _ => "x".red(),
        };
        let tool = match step.tool_version {
            Some(version) => format!("{}@{}", step.tool, version),
            None => step.tool.clone(),
        };
        let mut line = format!(
            "  {} {:<12} {:<32} {:<10} {} attempt(s) {}ms\n",
            marker,
            step.step_id.as_str(),
            tool,
            step.status.as_str(),
            step.attempts,
            step.duration_ms
        );
        if let Some(failure) = &step.failure {
            line.push_str(&format!("{}\n", Self::indent(&failure.to_string(), "      ").dimmed()));
        }
        line
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
