//! Proposer binary entry point.

use clap::Parser;
use output_proposer::{Cli, ProposerConfig};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = ProposerConfig::from_cli(Cli::parse())?;
    output_proposer::run(config).await
}
