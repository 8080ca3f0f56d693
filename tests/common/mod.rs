//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use haproxy_config_manager::api;
use haproxy_config_manager::config::HaproxyConfig;
use haproxy_config_manager::haproxy::TokioRunner;
use haproxy_config_manager::metrics::Metrics;
use haproxy_config_manager::pipeline::Pipeline;
use haproxy_config_manager::store::MemoryStore;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Stand-in for `haproxy -c -f <file>`: rejects any file mentioning `bogus`.
const FAKE_CHECKER: &str = r#"
cfg="$3"
if grep -q bogus "$cfg"; then
  echo "[ALERT]    (1) : config : parsing [$cfg:2] : unknown keyword 'bogus' in 'global' section"
  echo "[ALERT]    (1) : config : Fatal errors found in configuration."
  exit 1
fi
if ! grep -q timeout "$cfg"; then
  echo "[WARNING]  (1) : config : missing timeouts for proxy 'bak'."
  echo "   | While not properly invalid, you will certainly encounter various problems"
fi
echo "Configuration file is valid"
"#;

pub const PROD_CONTENT: &str = "global \n    daemon \n\n";

/// A pipeline wired to files and scripts in a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub settings: HaproxyConfig,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let checker = dir.path().join("fake-haproxy.sh");
        std::fs::write(&checker, FAKE_CHECKER).unwrap();

        let prod = dir.path().join("haproxy.cfg");
        std::fs::write(&prod, PROD_CONTENT).unwrap();

        // The scripts are passed to /bin/sh instead of being executed directly.
        let settings = HaproxyConfig {
            prod_config_path: prod,
            dev_config_path: dir.path().join("haproxy.cfg.dev"),
            check_command: vec![
                "/bin/sh".to_string(),
                checker.display().to_string(),
                "-c".to_string(),
                "-f".to_string(),
                "{config}".to_string(),
            ],
            reload_command: "test -f {config} && echo reloaded {config}".to_string(),
            shell: Some(PathBuf::from("/bin/sh")),
            pid_file: dir.path().join("haproxy.pid"),
            ..HaproxyConfig::default()
        };

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(MemoryStore::new()),
            &settings,
            Arc::new(TokioRunner::new(Duration::from_secs(10))),
            Arc::new(Metrics::new().unwrap()),
        ));

        Self {
            dir,
            settings,
            pipeline,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.pipeline.clone())
    }

    pub fn read(&self, path: &std::path::Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

/// Sends one request and returns the status and raw body.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Sends one request and parses the body as JSON.
pub async fn send_json(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, text) = send(router, method, uri, body).await;
    let json = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, json)
}
