use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grimoire::config::GrimoireConfig;
use grimoire::db::Pool;
use grimoire::dispatch::Engine;
use grimoire::telegram::Bot;
use grimoire::{cli, config};

#[derive(Parser)]
#[command(name = "grimoire", version, about = "Personal divination journal Telegram bot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bot (long polling)
    Serve,
    /// Run database diagnostics and print a health report
    Doctor,
    /// Dump all records and outcomes as JSON to stdout
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = GrimoireConfig::load()?;

    // Log to stderr so stdout stays clean for the export command.
    let filter = EnvFilter::try_new(&config.bot.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => serve(config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Export => cli::export::export(&config)?,
    }

    Ok(())
}

async fn serve(config: GrimoireConfig) -> Result<()> {
    anyhow::ensure!(
        !config.bot.token.is_empty(),
        "no bot token configured; set bot.token in {} or GRIMOIRE_BOT_TOKEN",
        config::default_config_path().display()
    );
    anyhow::ensure!(
        !config.bot.allowed_users.is_empty(),
        "no allowed users configured; set bot.allowed_users or GRIMOIRE_ALLOWED_USERS"
    );

    let pool = Pool::open(config.resolved_db_path(), config.storage.max_connections)?;
    let engine = Arc::new(Engine::new(Arc::new(pool), config.bot.allowed_users.clone()));
    let bot = Bot::new(&config.bot.token, engine, config.bot.poll_timeout_secs);

    tokio::select! {
        result = bot.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
