mod chat_client;
mod cli;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::chat_client::{ChatClient, DEFAULT_ENDPOINT};
use crate::cli::chat::ChatContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Chat endpoint that receives {"message": ...} and answers {"reply": ...}
    #[arg(long, env = "FAITH_CHAT_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    endpoint: String,

    /// Send a single message and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Send a single message and exit
        #[arg(short, long)]
        input: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let (input, verbose) = match cli.command {
        Some(Commands::Chat { input, verbose }) => (input, verbose),
        None => (cli.input, cli.verbose),
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Faith AI Chat");

    let client = match ChatClient::new(&cli.endpoint) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize chat client: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!("Using chat endpoint {}", client.endpoint());

    let stdout = io::stdout();
    let decorated = stdout.is_terminal();
    let interactive = input.is_none();

    let mut chat_context = ChatContext::new(Box::new(stdout), input, interactive, decorated, client);
    chat_context.run().await
}
