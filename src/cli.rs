//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stores HAProxy configuration sections, assembles them and deploys the result.
#[derive(Parser, Debug)]
#[command(name = "haproxy-config-manager", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file. Built-in defaults apply when omitted.
    #[arg(short, long, env = "HAPROXY_MANAGER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level forced by verbosity flags, if any.
    pub fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API.
    Serve(ServeArgs),

    /// Validate the configuration file without starting.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the effective configuration.
    #[command(name = "config-show")]
    ConfigShow,

    /// Print the assembled HAProxy configuration.
    ///
    /// Reads sections from the configured store, so it needs
    /// `store.backend: redis` to see what the server holds.
    Preview,

    /// Write the assembled configuration to the staging file.
    ///
    /// Needs `store.backend: redis`, like `preview`.
    Generate,

    /// Run the HAProxy checker against the staging file.
    Check,

    /// Promote the staging file and reload HAProxy.
    Deploy,
}

/// Arguments for the serve subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding `server.bind_address`.
    #[arg(long, env = "HAPROXY_MANAGER_BIND")]
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_selects_level() {
        let cli = Cli::parse_from(["haproxy-config-manager", "-vv", "preview"]);
        assert_eq!(cli.log_level(), Some("trace"));
        assert!(matches!(cli.command, Commands::Preview));

        let cli = Cli::parse_from(["haproxy-config-manager", "check"]);
        assert_eq!(cli.log_level(), None);
    }

    #[test]
    fn serve_accepts_bind_override() {
        let cli = Cli::parse_from([
            "haproxy-config-manager",
            "--config",
            "/etc/manager.yaml",
            "serve",
            "--bind",
            "0.0.0.0:9000",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/manager.yaml")));
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.bind.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
