use clap::Parser;

mod cli;
mod commands;
mod config;
mod logging;
mod session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let mut config = config::SkylineConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides());
    logging::init(&config.log, cli.verbose)?;
    commands::run_command(cli, config).await
}
