//! Configuration checks through the daemon's own checker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::output::OutputParser;
use super::runner::{CommandLine, ProcessRunner};
use crate::config::model::HaproxyConfig;
use crate::error::ManagerError;

/// Result of a successful check. Warnings may be present even on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    #[serde(rename = "return code")]
    pub return_code: i32,
    pub diagnostics: Vec<String>,
}

/// Runs the configured check command against a configuration file.
pub struct Validator {
    check_command: Vec<String>,
    pid_file: PathBuf,
    parser: Arc<OutputParser>,
    runner: Arc<dyn ProcessRunner>,
}

impl Validator {
    /// Creates a validator from HAProxy settings.
    pub fn new(
        settings: &HaproxyConfig,
        parser: Arc<OutputParser>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            check_command: settings.check_command.clone(),
            pid_file: settings.pid_file.clone(),
            parser,
            runner,
        }
    }

    /// Checks `config_path`.
    ///
    /// A missing file is `NotFound`, a checker that cannot run is
    /// `ExecutionFailed`, and a non-zero exit is `ValidationFailed` carrying
    /// the parsed diagnostics.
    pub async fn validate(&self, config_path: &Path) -> Result<ValidationReport, ManagerError> {
        if !config_path.is_file() {
            return Err(ManagerError::not_found(format!(
                "configuration file '{}'",
                config_path.display()
            )));
        }

        let command = CommandLine::from_template(&self.check_command, config_path, &self.pid_file)?;
        tracing::debug!(command = %command, "Running configuration check");

        let output = self.runner.run(&command).await.inspect_err(|e| {
            warn!(path = %config_path.display(), error = %e, "Configuration check could not run");
        })?;
        let diagnostics = self.parser.parse(&output.output);

        if output.exit_code != 0 {
            warn!(
                path = %config_path.display(),
                return_code = output.exit_code,
                diagnostics = diagnostics.len(),
                "Configuration rejected by checker"
            );
            return Err(ManagerError::ValidationFailed {
                command: command.to_string(),
                return_code: output.exit_code,
                diagnostics,
            });
        }

        info!(
            path = %config_path.display(),
            warnings = diagnostics.len(),
            "Configuration is valid"
        );

        Ok(ValidationReport {
            return_code: output.exit_code,
            diagnostics,
        })
    }
}
