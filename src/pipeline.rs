//! Section lifecycle and the assemble → validate → deploy pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::assemble::{render, select_active, write_config};
use crate::config::model::{AppConfig, HaproxyConfig};
use crate::error::ManagerError;
use crate::haproxy::{
    DeployReport, Deployer, OutputParser, ProcessRunner, TokioRunner, ValidationReport, Validator,
};
use crate::metrics::Metrics;
use crate::section::{MetadataPatch, NewSection, Section, SectionSubmission};
use crate::store::{self, SectionStore};

/// Result of writing the staging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    pub path: PathBuf,
    pub sections: usize,
    pub bytes: usize,
}

/// Shared service behind the CLI and the HTTP API.
pub struct Pipeline {
    store: Arc<dyn SectionStore>,
    settings: HaproxyConfig,
    validator: Validator,
    deployer: Deployer,
    metrics: Arc<Metrics>,
    render_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn SectionStore>,
        settings: &HaproxyConfig,
        runner: Arc<dyn ProcessRunner>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let parser = Arc::new(OutputParser::new(settings.output_denylist.clone()));

        Self {
            store,
            settings: settings.clone(),
            validator: Validator::new(settings, parser.clone(), runner.clone()),
            deployer: Deployer::new(settings, parser, runner),
            metrics,
            render_lock: Mutex::new(()),
        }
    }

    /// Opens the configured store and wires a process runner bounded by the
    /// configured command timeout.
    pub async fn from_config(config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let store = store::open(&config.store).await?;
        let runner = Arc::new(TokioRunner::new(Duration::from_secs(
            config.haproxy.command_timeout_secs,
        )));
        Ok(Self::new(store, &config.haproxy, runner, metrics))
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>, ManagerError> {
        let result = self.store.list().await.map_err(ManagerError::from);
        if let Ok(sections) = &result {
            self.metrics.set_sections(sections.len());
        }
        self.track("list_sections", result)
    }

    pub async fn get_section(&self, checksum: &str) -> Result<Section, ManagerError> {
        let result = self.store.get(checksum).await.map_err(ManagerError::from);
        self.track("get_section", result)
    }

    /// Validates a submission and stores it under its checksum.
    pub async fn create_section(
        &self,
        submission: SectionSubmission,
    ) -> Result<Section, ManagerError> {
        let result = self.create(submission).await;
        if let Ok(section) = &result {
            info!(
                checksum = %section.checksum,
                section = %section.section_type,
                name = ?section.section_name,
                "Section stored"
            );
        }
        self.track("create_section", result)
    }

    async fn create(&self, submission: SectionSubmission) -> Result<Section, ManagerError> {
        let new = NewSection::from_submission(submission, &self.settings)?;
        let section = new.into_section(Utc::now());
        Ok(self.store.create(section).await?)
    }

    /// Marks a section as the most recent of its `(type, name)` group.
    pub async fn touch_section(
        &self,
        checksum: &str,
        patch: MetadataPatch,
    ) -> Result<Section, ManagerError> {
        let result = self.store.update(checksum, patch).await.map_err(ManagerError::from);
        self.track("touch_section", result)
    }

    pub async fn delete_section(&self, checksum: &str) -> Result<(), ManagerError> {
        let result = self.store.delete(checksum).await.map_err(ManagerError::from);
        if result.is_ok() {
            info!(checksum = %checksum, "Section deleted");
        }
        self.track("delete_section", result)
    }

    /// Renders the active sections without touching the filesystem.
    pub async fn preview(&self) -> Result<String, ManagerError> {
        let result = self.assemble().await.map(|(text, _)| text);
        self.track("preview", result)
    }

    /// Renders the active sections into the staging file.
    ///
    /// Concurrent calls in this process are serialized around render and write.
    pub async fn generate(&self) -> Result<GenerateReport, ManagerError> {
        let result: Result<GenerateReport, ManagerError> = async {
            let _guard = self.render_lock.lock().await;
            let (text, sections) = self.assemble().await?;
            let path = &self.settings.dev_config_path;
            write_config(path, &text)?;
            Ok(GenerateReport {
                path: path.clone(),
                sections,
                bytes: text.len(),
            })
        }
        .await;
        self.track("generate", result)
    }

    /// Runs the checker against the staging file.
    pub async fn validate(&self) -> Result<ValidationReport, ManagerError> {
        let started = Instant::now();
        let result = self.validator.validate(&self.settings.dev_config_path).await;
        self.metrics
            .observe_command("check", started.elapsed().as_secs_f64());
        self.track("validate", result)
    }

    /// Promotes the staging file and reloads the daemon.
    pub async fn deploy(&self) -> Result<DeployReport, ManagerError> {
        let started = Instant::now();
        let result = self.deployer.deploy().await;
        self.metrics
            .observe_command("deploy", started.elapsed().as_secs_f64());
        self.track("deploy", result)
    }

    async fn assemble(&self) -> Result<(String, usize), ManagerError> {
        let sections = self.store.list().await?;
        self.metrics.set_sections(sections.len());
        let active = select_active(sections)?;
        Ok((render(&active), active.len()))
    }

    fn track<T>(
        &self,
        operation: &'static str,
        result: Result<T, ManagerError>,
    ) -> Result<T, ManagerError> {
        self.metrics.record(operation, result.is_ok());
        if let Err(e) = &result {
            warn!(operation, kind = e.kind().as_str(), error = %e, "Operation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::haproxy::runner::{MockProcessRunner, ProcessOutput};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn pipeline(settings: &HaproxyConfig, runner: MockProcessRunner) -> Pipeline {
        Pipeline::new(
            Arc::new(MemoryStore::new()),
            settings,
            Arc::new(runner),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn submission(section: &str, name: Option<&str>, configuration: serde_json::Value) -> SectionSubmission {
        SectionSubmission {
            section: Some(section.to_string()),
            section_name: name.map(str::to_string),
            configuration: Some(configuration),
        }
    }

    #[tokio::test]
    async fn preview_on_empty_store_is_not_found() {
        let p = pipeline(&HaproxyConfig::default(), MockProcessRunner::new());
        assert_eq!(p.preview().await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn duplicate_submission_conflicts() {
        let p = pipeline(&HaproxyConfig::default(), MockProcessRunner::new());
        let body = json!({"daemon": null});

        p.create_section(submission("global", None, body.clone())).await.unwrap();
        let err = p.create_section(submission("global", None, body)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(p.list_sections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn touched_section_becomes_active() {
        let p = pipeline(&HaproxyConfig::default(), MockProcessRunner::new());
        let first = p
            .create_section(submission("backend", Some("bak"), json!({"balance": "roundrobin"})))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        p.create_section(submission("backend", Some("bak"), json!({"balance": "leastconn"})))
            .await
            .unwrap();
        assert!(p.preview().await.unwrap().contains("leastconn"));

        let touched = p.touch_section(&first.checksum, MetadataPatch::default()).await.unwrap();

        assert_eq!(touched.checksum, first.checksum);
        let text = p.preview().await.unwrap();
        assert!(text.contains("    balance roundrobin\n"));
        assert!(!text.contains("leastconn"));
    }

    #[tokio::test]
    async fn generate_writes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HaproxyConfig {
            dev_config_path: dir.path().join("haproxy.cfg.dev"),
            ..HaproxyConfig::default()
        };
        let p = pipeline(&settings, MockProcessRunner::new());
        p.create_section(submission("global", None, json!({"daemon": ""}))).await.unwrap();

        let report = p.generate().await.unwrap();

        assert_eq!(report.sections, 1);
        let written = std::fs::read_to_string(&settings.dev_config_path).unwrap();
        assert_eq!(written, "global \n    daemon \n\n");
        assert_eq!(report.bytes, written.len());
    }

    #[tokio::test]
    async fn validate_reads_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HaproxyConfig {
            dev_config_path: dir.path().join("haproxy.cfg.dev"),
            ..HaproxyConfig::default()
        };
        std::fs::write(&settings.dev_config_path, "global \n\n").unwrap();

        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(ProcessOutput {
                exit_code: 0,
                output: "Configuration file is valid\n".to_string(),
            })
        });
        let p = pipeline(&settings, runner);

        let report = p.validate().await.unwrap();
        assert_eq!(report.return_code, 0);
        assert!(report.diagnostics.is_empty());

        let metrics = p.metrics().gather().unwrap();
        assert!(metrics.contains(r#"operation="validate",outcome="success""#));
    }

    #[tokio::test]
    async fn invalid_submission_is_counted_as_failure() {
        let p = pipeline(&HaproxyConfig::default(), MockProcessRunner::new());
        let err = p
            .create_section(submission("frontend", None, json!({"bind": "*:80"})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(p
            .metrics()
            .gather()
            .unwrap()
            .contains(r#"operation="create_section",outcome="failure""#));
    }
}
