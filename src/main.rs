mod cli;
mod error;
mod github;
mod output;
mod workflow;

use anyhow::Result;
use clap::Parser;
use log::info;

use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Checking workflow runs for retry");
    cli.execute()?;

    Ok(())
}
