use anyhow::Result;
use clap::Parser;
use haproxy_config_manager::{cli::Cli, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
