use clap::Parser;
use feedsync_cli::cli::Cli;
use feedsync_cli::logging::{LogFormat, init_global};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // dotenv never overrides variables that are already set, so `.env.local` wins over `.env`.
    let _ = dotenv::from_filename(".env.local");
    let _ = dotenv::dotenv();

    init_global(LogFormat::from_env())?;
    let cmd = Cli::parse().into_command()?;
    feedsync_cli::commands::run(cmd).await
}
