//! Interaction with the HAProxy binary: checks, promotion and reloads.

pub mod deployer;
pub mod output;
pub mod runner;
pub mod validator;

pub use deployer::{DeployReport, Deployer, ReloadMethod};
pub use output::OutputParser;
pub use runner::{CommandLine, ProcessOutput, ProcessRunner, TokioRunner};
pub use validator::{ValidationReport, Validator};
