//! `resumatch` -- command-line client for the résumé scoring service.
//!
//! Long-running commands (`parse`, `match`, `bulk`) open the push channel
//! for the logged-in user and print progress as it arrives. See
//! [`ClientConfig::from_env`] for the environment variables.

use clap::Parser;
use resumatch_cli::app::App;
use resumatch_cli::command::Cli;
use resumatch_cli::config::ClientConfig;
use resumatch_cli::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = ClientConfig::from_env()?;
    logging::init(config.log_format);

    tracing::debug!(api_url = %config.api_url, channel_url = %config.channel_url, "Starting resumatch");

    let app = App::new(&config).await?;
    app.run(cli.command).await
}
