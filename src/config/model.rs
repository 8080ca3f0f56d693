//! Configuration data structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure containing all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Section store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// HAProxy paths and commands.
    #[serde(default)]
    pub haproxy: HaproxyConfig,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Which backend persists section records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on restart.
    #[default]
    Memory,
    /// Redis-backed store.
    Redis,
}

/// Encoding used for stored metadata and configuration fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    /// `base64:` prefixed, base64 encoded JSON.
    #[default]
    Base64Json,
    /// Plain JSON text.
    Json,
}

/// Section store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection settings, used when `backend` is `redis`.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Field codec for the Redis backend.
    #[serde(default)]
    pub codec: CodecKind,
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis server hostname.
    #[serde(default = "default_redis_host")]
    pub host: String,

    /// Redis server port.
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Redis database number.
    #[serde(default)]
    pub db: u8,

    /// Optional Redis password.
    #[serde(default)]
    pub password: Option<String>,

    /// Prefix applied to every key written by the store.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisConfig {
    /// Builds the Redis URL from configuration.
    pub fn url(&self) -> String {
        match &self.password {
            Some(pass) => format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// HAProxy integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaproxyConfig {
    /// Section types that must carry a section name.
    #[serde(default = "default_named_sections")]
    pub named_sections: Vec<String>,

    /// Checker output lines that carry no diagnostic value.
    #[serde(default = "default_output_denylist")]
    pub output_denylist: Vec<String>,

    /// Live configuration read by the running daemon.
    #[serde(default = "default_prod_config_path")]
    pub prod_config_path: PathBuf,

    /// Staging configuration written by `generate`.
    #[serde(default = "default_dev_config_path")]
    pub dev_config_path: PathBuf,

    /// Configuration check command; `{config}` is replaced by the file path.
    #[serde(default = "default_check_command")]
    pub check_command: Vec<String>,

    /// Reload command line, run through `shell`. Supports `{config}` and `{pidfile}`.
    #[serde(default = "default_reload_command")]
    pub reload_command: String,

    /// Restart command used when no shell is available.
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,

    /// Shell interpreter for the reload command. Absent disables reload.
    #[serde(default = "default_shell")]
    pub shell: Option<PathBuf>,

    /// PID file of the running daemon.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Upper bound for any external command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl HaproxyConfig {
    /// Returns the path the backup of the live configuration is written to.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.prod_config_path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Returns true if the given section type requires a name.
    pub fn is_named(&self, section_type: &str) -> bool {
        self.named_sections.iter().any(|s| s == section_type)
    }
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_redis_host() -> String {
    "redis".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_key_prefix() -> String {
    "haproxy:".to_string()
}

fn default_named_sections() -> Vec<String> {
    vec![
        "frontend".to_string(),
        "backend".to_string(),
        "listen".to_string(),
    ]
}

fn default_output_denylist() -> Vec<String> {
    vec!["Configuration file is valid".to_string()]
}

fn default_prod_config_path() -> PathBuf {
    PathBuf::from("/etc/haproxy/haproxy.cfg")
}

fn default_dev_config_path() -> PathBuf {
    PathBuf::from("/etc/haproxy/haproxy.cfg.dev")
}

fn default_check_command() -> Vec<String> {
    vec![
        "haproxy".to_string(),
        "-c".to_string(),
        "-f".to_string(),
        "{config}".to_string(),
    ]
}

fn default_reload_command() -> String {
    "haproxy -f {config} -p {pidfile} -D -sf $(cat {pidfile})".to_string()
}

fn default_restart_command() -> Vec<String> {
    vec![
        "service".to_string(),
        "haproxy".to_string(),
        "restart".to_string(),
    ]
}

fn default_shell() -> Option<PathBuf> {
    Some(PathBuf::from("/bin/sh"))
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/run/haproxy.pid")
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            haproxy: HaproxyConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for HaproxyConfig {
    fn default() -> Self {
        Self {
            named_sections: default_named_sections(),
            output_denylist: default_output_denylist(),
            prod_config_path: default_prod_config_path(),
            dev_config_path: default_dev_config_path(),
            check_command: default_check_command(),
            reload_command: default_reload_command(),
            restart_command: default_restart_command(),
            shell: default_shell(),
            pid_file: default_pid_file(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.haproxy.command_timeout_secs, 30);
        assert!(config.haproxy.is_named("backend"));
        assert!(!config.haproxy.is_named("global"));
    }

    #[test]
    fn backup_path_appends_bak() {
        let mut haproxy = HaproxyConfig::default();
        haproxy.prod_config_path = PathBuf::from("/tmp/haproxy.cfg");
        assert_eq!(haproxy.backup_path(), PathBuf::from("/tmp/haproxy.cfg.bak"));
    }

    #[test]
    fn redis_url_includes_password() {
        let redis = RedisConfig {
            password: Some("secret".to_string()),
            ..RedisConfig::default()
        };
        assert_eq!(redis.url(), "redis://:secret@redis:6379/0");
    }
}
