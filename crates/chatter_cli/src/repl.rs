//! Terminal chat loop. Every line is treated as addressed to the bot.

use chatter_brain::{ChatCoordinator, InboundMessage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, Write};
use tracing::error;

const HELP: &str = "\
/seed <word>  generate from a specific seed
/stats        show what the brain knows
/anger        show the current anger level
/save         persist bot settings
quit          leave";

pub async fn run(chat: &mut ChatCoordinator, channel: &str) -> anyhow::Result<()> {
    let mut rng = StdRng::from_entropy();

    println!(
        "{} is listening. Type 'quit' to exit, '/help' for commands.",
        chat.bot_name()
    );
    prompt()?;

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();

        match trimmed {
            "" => {}
            "quit" | "exit" => break,
            "/help" => println!("{}", HELP),
            "/stats" => {
                let stats = chat.brain().stats().await?;
                println!("{} words, {} ngrams", stats.words, stats.ngrams);
            }
            "/anger" => println!("anger level: {:.3}", chat.settings().anger_level),
            "/save" => match chat.save_settings().await {
                Ok(()) => println!("Settings saved."),
                Err(e) => error!("{:#}", e),
            },
            _ if trimmed.starts_with("/seed") => {
                let seed = trimmed.trim_start_matches("/seed").trim();
                let reply = chat.brain().get_response(seed, &mut rng).await?;
                println!("\n{}: {}\n", chat.bot_name(), reply);
            }
            _ => {
                let msg = InboundMessage::new("terminal-user", channel, trimmed).mentioning_bot();
                match chat.handle_message(&msg, &mut rng).await {
                    Ok(Some(reply)) => println!("\n{}: {}\n", chat.bot_name(), reply),
                    Ok(None) => {}
                    Err(e) => {
                        error!("Error handling message: {:#}", e);
                        println!("\n[System Error]: {}\n", e);
                    }
                }
            }
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
