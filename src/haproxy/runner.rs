//! External command execution with a bounded runtime.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ManagerError;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Builds a command from a template, substituting `{config}` and `{pidfile}`.
    pub fn from_template(
        template: &[String],
        config: &Path,
        pid_file: &Path,
    ) -> Result<Self, ManagerError> {
        let mut parts = template.iter().map(|part| substitute(part, config, pid_file));
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ManagerError::ExecutionFailed {
                command: String::new(),
                code: None,
                message: "command template is empty".to_string(),
            })?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Builds `<shell> -c <script>` with placeholders in `script` substituted.
    pub fn shell(shell: &Path, script: &str, config: &Path, pid_file: &Path) -> Self {
        Self {
            program: shell.display().to_string(),
            args: vec!["-c".to_string(), substitute(script, config, pid_file)],
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and merged output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Stdout followed by stderr.
    pub output: String,
}

/// Runs external commands on behalf of the validator and deployer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` to completion. Launch failures and timeouts are
    /// `ExecutionFailed`; a non-zero exit is returned as output.
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput, ManagerError>;
}

/// Runs commands with `tokio::process`, killing them after `timeout`.
#[derive(Debug, Clone)]
pub struct TokioRunner {
    timeout: Duration,
}

impl TokioRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput, ManagerError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %command, "Running command");
        let started = Instant::now();

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| ManagerError::ExecutionFailed {
                command: command.to_string(),
                code: e.raw_os_error(),
                message: e.to_string(),
            })?,
            Err(_) => {
                return Err(ManagerError::ExecutionFailed {
                    command: command.to_string(),
                    code: None,
                    message: format!("timed out after {} seconds", self.timeout.as_secs_f64()),
                });
            }
        };

        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            cmd = %command,
            exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );

        Ok(ProcessOutput {
            exit_code,
            output: merged,
        })
    }
}

fn substitute(template: &str, config: &Path, pid_file: &Path) -> String {
    template
        .replace("{config}", &config.display().to_string())
        .replace("{pidfile}", &pid_file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sh(script: &str) -> CommandLine {
        CommandLine::shell(Path::new("/bin/sh"), script, Path::new("/tmp/x.cfg"), Path::new("/run/x.pid"))
    }

    #[test]
    fn template_substitutes_placeholders() {
        let template: Vec<String> = ["haproxy", "-c", "-f", "{config}", "-p", "{pidfile}"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let cmd = CommandLine::from_template(&template, Path::new("/etc/h.cfg"), Path::new("/run/h.pid")).unwrap();

        assert_eq!(cmd.program, "haproxy");
        assert_eq!(cmd.args, vec!["-c", "-f", "/etc/h.cfg", "-p", "/run/h.pid"]);
        assert_eq!(cmd.to_string(), "haproxy -c -f /etc/h.cfg -p /run/h.pid");
    }

    #[test]
    fn empty_template_is_rejected() {
        let err = CommandLine::from_template(&[], Path::new("a"), Path::new("b")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[test]
    fn shell_command_wraps_script() {
        let cmd = sh("kill -USR2 $(cat {pidfile}) && echo {config}");
        assert_eq!(cmd.program, "/bin/sh");
        assert_eq!(cmd.args, vec!["-c", "kill -USR2 $(cat /run/x.pid) && echo /tmp/x.cfg"]);
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr() {
        let runner = TokioRunner::new(Duration::from_secs(5));
        let out = runner.run(&sh("echo out; echo err 1>&2; exit 3")).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn missing_executable_is_execution_failure() {
        let runner = TokioRunner::new(Duration::from_secs(5));
        let cmd = CommandLine {
            program: "/nonexistent/haproxy".to_string(),
            args: vec![],
        };
        let err = runner.run(&cmd).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let runner = TokioRunner::new(Duration::from_millis(200));
        let err = runner.run(&sh("sleep 5")).await.unwrap_err();
        match err {
            ManagerError::ExecutionFailed { message, code, .. } => {
                assert!(message.contains("timed out"));
                assert_eq!(code, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
