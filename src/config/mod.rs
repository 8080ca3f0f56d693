//! Application settings: model, loading and checks.

pub mod loader;
pub mod model;
pub mod validation;

pub use model::{AppConfig, HaproxyConfig, StoreConfig};
pub use validation::{format_report, validate_config, ValidationIssue, ValidationResult};
