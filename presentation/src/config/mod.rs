//! Presentation-level configuration
//!
//! Resolved from CLI flags and the `[output]` config section.

use conductor_domain::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Enable colored terminal output
    pub color: bool,
    /// Show progress indicators
    pub show_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
            show_progress: true,
        }
    }
}

impl OutputConfig {
    /// CLI flags win over file settings. JSON output never shows progress,
    /// so stdout stays machine-readable.
    pub fn resolve(
        cli_format: Option<OutputFormat>,
        file_format: Option<OutputFormat>,
        file_color: bool,
        quiet: bool,
    ) -> Self {
        let format = cli_format.or(file_format).unwrap_or_default();
        Self {
            format,
            color: file_color,
            show_progress: !quiet && format == OutputFormat::Text,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Apply the color setting to all later console output.
    pub fn apply_color(&self) {
        if !self.color {
            colored::control::set_override(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_format_wins() {
        let config = OutputConfig::resolve(Some(OutputFormat::Json), Some(OutputFormat::Text), true, false);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_quiet_hides_progress() {
        let config = OutputConfig::resolve(None, None, false, true);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(!config.color);
        assert!(!config.show_progress);
        assert!(OutputConfig::resolve(None, None, true, false).show_progress);
    }
}
