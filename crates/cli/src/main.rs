//! Snello CLI — the main entry point.
//!
//! Commands:
//! - `chat`      — Interactive chat or single-message mode
//! - `serve`     — Start the web chat
//! - `sessions`  — List, show, delete or import saved chats
//! - `todo`      — Inspect or clear the to-do list

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "snello",
    about = "Snello — a conversational to-do list assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with Snello
    Chat {
        /// Continue a saved session
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the web chat server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage saved chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Inspect the to-do list
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved sessions, newest first
    List,
    /// Print a session's conversation
    Show { id: String },
    /// Delete a session
    Delete { id: String },
    /// Import a JSON transcript as a new session
    Import { file: std::path::PathBuf },
}

#[derive(Subcommand)]
enum TodoAction {
    /// Print the to-do list
    List,
    /// Remove every item
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { session, message } => commands::chat::run(session, message).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list().await?,
            SessionsAction::Show { id } => commands::sessions::show(&id).await?,
            SessionsAction::Delete { id } => commands::sessions::delete(&id).await?,
            SessionsAction::Import { file } => commands::sessions::import(&file).await?,
        },
        Commands::Todo { action } => match action {
            TodoAction::List => commands::todo::list().await?,
            TodoAction::Clear { yes } => commands::todo::clear(yes).await?,
        },
    }

    Ok(())
}
