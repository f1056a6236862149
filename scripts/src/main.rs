use clap::Parser;
use credentials_deploy::{cli::Cli, config::Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load `.env` before parsing so its values back the env-sourced flags
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_inputs(cli.config_inputs())?;
    cli.command.run(&config, &cli.network).await?;

    Ok(())
}
