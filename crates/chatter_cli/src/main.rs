use anyhow::Context;
use chatter_brain::ChatCoordinator;
use chatter_core::ChatterConfig;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod repl;

#[derive(Parser, Debug)]
#[command(name = "chatter", author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "chatter.toml")]
    config: String,

    /// Database path (overrides the config file)
    #[arg(short, long, env = "CHATTER_DB_PATH")]
    db: Option<String>,

    /// Bot name (overrides the config file)
    #[arg(short, long, env = "CHATTER_BOT_NAME")]
    bot: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Talk to the bot in the terminal (default)
    Chat {
        /// Channel the terminal session speaks in
        #[arg(long, default_value = "terminal")]
        channel: String,
    },
    /// Learn every non-empty line of a text file
    Train {
        file: PathBuf,
    },
    /// Print what the brain knows
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut config = ChatterConfig::load_or_default(&cli.config);
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }
    if let Some(bot) = cli.bot {
        config.brain.bot_name = bot;
    }

    info!("Opening brain at {}...", config.storage.db_path);
    let mut chat = ChatCoordinator::open(&config).await?;

    match cli.command.unwrap_or(Commands::Chat {
        channel: "terminal".to_string(),
    }) {
        Commands::Chat { channel } => repl::run(&mut chat, &channel).await?,
        Commands::Train { file } => train(&mut chat, &file).await?,
        Commands::Stats => {
            let stats = chat.brain().stats().await?;
            println!("bot:          {}", chat.bot_name());
            println!("words:        {}", stats.words);
            println!("ngrams:       {}", stats.ngrams);
            println!("chain length: {}", stats.chain_length);
        }
    }

    chat.save_settings().await?;
    Ok(())
}

async fn train(chat: &mut ChatCoordinator, file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut seen = 0usize;
    let mut learned = 0usize;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        seen += 1;
        if chat.brain_mut().learn(line).await? {
            learned += 1;
        }
    }

    info!("Training from {} finished", file.display());
    println!("Learned {} of {} lines", learned, seen);
    Ok(())
}
