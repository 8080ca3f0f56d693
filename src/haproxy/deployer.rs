//! Promotion of the staging configuration and daemon reload.
//!
//! Steps run in order: backup, promote, reload. The first failing step ends
//! the run and is named in the returned error. A failure never undoes earlier steps. `<prod>.bak` holds the previous
//! live configuration once the backup step has succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::output::OutputParser;
use super::runner::{CommandLine, ProcessRunner};
use crate::config::model::HaproxyConfig;
use crate::error::{DeployStep, ManagerError};

/// How the daemon was told about the new configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMethod {
    /// Graceful reload through the configured shell.
    Reload,
    /// Service restart, used when no shell is available.
    Restart,
}

/// Outcome of a completed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub backup_path: PathBuf,
    pub method: ReloadMethod,
    #[serde(rename = "return code")]
    pub return_code: i32,
    pub diagnostics: Vec<String>,
}

/// Backs up the live configuration, promotes the staging file and reloads.
pub struct Deployer {
    settings: HaproxyConfig,
    parser: Arc<OutputParser>,
    runner: Arc<dyn ProcessRunner>,
}

impl Deployer {
    /// Creates a deployer from HAProxy settings.
    pub fn new(
        settings: &HaproxyConfig,
        parser: Arc<OutputParser>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            parser,
            runner,
        }
    }

    /// Deploys the staging configuration to production.
    pub async fn deploy(&self) -> Result<DeployReport, ManagerError> {
        let dev = &self.settings.dev_config_path;
        let prod = &self.settings.prod_config_path;
        let backup = self.settings.backup_path();

        for path in [dev, prod] {
            if !path.is_file() {
                return Err(ManagerError::not_found(format!(
                    "configuration file '{}'",
                    path.display()
                )));
            }
        }

        let result = self.run_steps(dev, prod, &backup).await;

        match &result {
            Ok(report) => info!(
                prod = %prod.display(),
                method = ?report.method,
                warnings = report.diagnostics.len(),
                "Deployment complete"
            ),
            Err(e) => error!(
                prod = %prod.display(),
                step = ?e.deploy_step(),
                error = %e,
                "Deployment failed"
            ),
        }

        result
    }

    async fn run_steps(
        &self,
        dev: &Path,
        prod: &Path,
        backup: &Path,
    ) -> Result<DeployReport, ManagerError> {
        if let Err(e) = std::fs::copy(prod, backup) {
            return Err(ManagerError::storage(backup, &e).at_step(DeployStep::Backup));
        }
        info!(backup = %backup.display(), "Live configuration backed up");

        promote(dev, prod).map_err(|e| e.at_step(DeployStep::Promote))?;
        info!(prod = %prod.display(), "Staging configuration promoted");

        let (method, command) = self
            .reload_command()
            .map_err(|e| e.at_step(DeployStep::Reload))?;
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| e.at_step(DeployStep::Reload))?;
        let diagnostics = self.parser.parse(&output.output);

        if output.exit_code != 0 {
            warn!(
                method = ?method,
                return_code = output.exit_code,
                "Daemon did not accept the new configuration; it is already live"
            );
            return Err(ManagerError::ValidationFailed {
                command: command.to_string(),
                return_code: output.exit_code,
                diagnostics,
            }
            .at_step(DeployStep::Reload));
        }

        Ok(DeployReport {
            backup_path: backup.to_path_buf(),
            method,
            return_code: output.exit_code,
            diagnostics,
        })
    }

    /// Reload through the shell when one is configured and present, else restart.
    fn reload_command(&self) -> Result<(ReloadMethod, CommandLine), ManagerError> {
        let prod = &self.settings.prod_config_path;
        let pid_file = &self.settings.pid_file;

        match self.settings.shell.as_deref().filter(|s| s.is_file()) {
            Some(shell) => Ok((
                ReloadMethod::Reload,
                CommandLine::shell(shell, &self.settings.reload_command, prod, pid_file),
            )),
            None => {
                let command =
                    CommandLine::from_template(&self.settings.restart_command, prod, pid_file)?;
                Ok((ReloadMethod::Restart, command))
            }
        }
    }
}

/// Replaces `prod` with the content of `dev` through a rename in the same directory.
fn promote(dev: &Path, prod: &Path) -> Result<(), ManagerError> {
    let file_name = prod
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "haproxy.cfg".to_string());
    let staged = prod.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = std::fs::copy(dev, &staged)
        .and_then(|_| {
            let permissions = std::fs::metadata(prod)?.permissions();
            std::fs::set_permissions(&staged, permissions)
        })
        .and_then(|()| std::fs::rename(&staged, prod));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&staged);
        return Err(ManagerError::storage(prod, &e));
    }

    Ok(())
}
