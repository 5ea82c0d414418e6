//! `snello chat` — Interactive or single-message chat mode.

use snello_agent::{ActiveChat, ChatService, display_messages};
use snello_core::Message;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::load_config;

pub async fn run(
    session: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    GOOGLE_API_KEY=...   (Gemini, the default provider)");
        eprintln!("    SNELLO_API_KEY=...   (any provider)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", snello_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let service = ChatService::from_config(&config).await?;

    let mut chat = match session.as_deref() {
        Some(id) => service.resume(id).await?,
        None => service.start(),
    };

    if let Some(msg) = message {
        let turn = service.send(&mut chat, &msg).await?;
        println!("{}", turn.reply);
        eprintln!("  (session {})", turn.session_id);
        return Ok(());
    }

    println!();
    println!("  Snello — your to-do list assistant");
    println!();
    println!("  Model:  {}", config.default_model);
    println!("  Tools:  {}", service.agent().tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or press Ctrl+D to quit.");
    println!();

    replay(&chat);
    repl(&service, &mut chat).await?;

    println!();
    println!("  Goodbye!");
    if let Some(id) = &chat.session_id {
        println!("  Resume with: snello chat --session {id}");
    }
    println!();

    Ok(())
}

/// Print a resumed conversation so the user has context.
fn replay(chat: &ActiveChat) {
    for message in display_messages(&chat.messages) {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let prefix = match message {
        Message::Human { .. } => "You",
        _ => "Snello",
    };
    for line in message.content().lines() {
        println!("  {prefix} > {line}");
    }
    println!();
}

/// What one line typed at the prompt asks for.
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Blank,
    Exit,
    Message(&'a str),
}

fn read_line(line: &str) -> Line<'_> {
    let input = line.trim();
    if input.is_empty() {
        Line::Blank
    } else if input.eq_ignore_ascii_case("exit") {
        Line::Exit
    } else {
        Line::Message(input)
    }
}

async fn repl(service: &ChatService, chat: &mut ActiveChat) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = match read_line(&line) {
            Line::Blank => continue,
            Line::Exit => break,
            Line::Message(input) => input,
        };

        eprint!("  ...");
        let result = service.send(chat, input).await;
        eprint!("\r     \r");

        match result {
            Ok(turn) => {
                println!();
                for line in turn.reply.lines() {
                    println!("  Snello > {line}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    Ok(())
}
