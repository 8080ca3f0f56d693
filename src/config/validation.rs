//! Settings checks run before a configuration file is accepted.

use std::path::Path;

use crate::section::model::{suggest_section_type, KNOWN_SECTION_TYPES};

use super::model::{AppConfig, HaproxyConfig};

const CONFIG_PLACEHOLDER: &str = "{config}";

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Blocks configuration loading.
    Error,
    /// Logged but allows loading.
    Warning,
}

/// A problem found in one settings field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    /// Dotted path of the field, e.g. `haproxy.named_sections[1]`.
    pub path: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Issues collected from every check.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns true if there are no errors. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Runs all settings checks.
pub fn validate_config(config: &AppConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        result.add(
            ValidationIssue::error(
                "server.bind_address",
                format!("Not a socket address: '{}'", config.server.bind_address),
            )
            .with_suggestion("Use host:port, e.g. 127.0.0.1:8000"),
        );
    }

    validate_haproxy(&config.haproxy, &mut result);
    result
}

fn validate_haproxy(haproxy: &HaproxyConfig, result: &mut ValidationResult) {
    for (i, section_type) in haproxy.named_sections.iter().enumerate() {
        if !KNOWN_SECTION_TYPES.contains(&section_type.as_str()) {
            result.add(
                ValidationIssue::error(
                    format!("haproxy.named_sections[{}]", i),
                    format!("Unknown section type '{}'", section_type),
                )
                .with_suggestion(format!(
                    "Did you mean '{}'?",
                    suggest_section_type(section_type)
                )),
            );
        }
    }

    if haproxy.check_command.is_empty() {
        result.add(ValidationIssue::error(
            "haproxy.check_command",
            "Check command must not be empty",
        ));
    } else if !haproxy
        .check_command
        .iter()
        .any(|arg| arg.contains(CONFIG_PLACEHOLDER))
    {
        result.add(
            ValidationIssue::error(
                "haproxy.check_command",
                "Check command never receives the configuration file",
            )
            .with_suggestion("Add a '{config}' argument"),
        );
    }

    if haproxy.restart_command.is_empty() {
        result.add(ValidationIssue::error(
            "haproxy.restart_command",
            "Restart command must not be empty",
        ));
    }

    if haproxy.command_timeout_secs == 0 {
        result.add(ValidationIssue::error(
            "haproxy.command_timeout_secs",
            "Command timeout must be greater than zero",
        ));
    }

    if haproxy.dev_config_path == haproxy.prod_config_path {
        result.add(ValidationIssue::error(
            "haproxy.dev_config_path",
            "Staging and live configuration paths cannot be the same",
        ));
    }

    match &haproxy.shell {
        Some(shell) if !shell.is_file() => result.add(
            ValidationIssue::warning(
                "haproxy.shell",
                format!("Shell not found: '{}'", shell.display()),
            )
            .with_suggestion("Deploy will fall back to the restart command"),
        ),
        _ => {}
    }

    if !haproxy.reload_command.contains(CONFIG_PLACEHOLDER) {
        result.add(ValidationIssue::warning(
            "haproxy.reload_command",
            "Reload command does not reference '{config}'",
        ));
    }

    if let Some(parent) = haproxy.dev_config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            result.add(
                ValidationIssue::warning(
                    "haproxy.dev_config_path",
                    format!("Directory does not exist: '{}'", parent.display()),
                )
                .with_suggestion("Create the directory before generating"),
            );
        }
    }
}

/// Formats the settings check of `source` (built-in defaults when `None`).
///
/// One row per issue, errors first, with the offending key in the first
/// column and any hint on the row below.
pub fn format_report(result: &ValidationResult, source: Option<&Path>) -> String {
    let source = match source {
        Some(path) => format!("'{}'", path.display()),
        None => "built-in defaults".to_string(),
    };

    let errors: Vec<_> = result.errors().collect();
    let warnings: Vec<_> = result.warnings().collect();
    if errors.is_empty() && warnings.is_empty() {
        return format!("Manager settings from {} are valid.", source);
    }

    let width = errors
        .iter()
        .chain(&warnings)
        .map(|issue| issue.path.len())
        .max()
        .unwrap_or(0);

    let mut report = format!("Manager settings from {}\n", source);
    for issue in errors.iter().chain(&warnings) {
        report.push_str(&format_issue(issue, width));
    }

    report.push_str(&format!(
        "{}, {}",
        plural(errors.len(), "error"),
        plural(warnings.len(), "warning")
    ));
    if errors.is_empty() {
        report.push_str(": settings accepted.\n");
    } else {
        report.push_str(": settings rejected, the manager was not started.\n");
    }

    report
}

fn format_issue(issue: &ValidationIssue, width: usize) -> String {
    let severity = match issue.severity {
        ValidationSeverity::Error => "error",
        ValidationSeverity::Warning => "warning",
    };

    let mut row = format!("  {:<width$}  {:<7}  {}\n", issue.path, severity, issue.message);
    if let Some(suggestion) = &issue.suggestion {
        row.push_str(&format!("  {:<width$}  {:<7}  {}\n", "", "hint", suggestion));
    }
    row
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
