//! chat-relay client binary.
//!
//! Usage: `chat-client <hostname> <port>`

use chat_relay::client::{self, ClientEnd};
use chat_relay::console::Console;
use chat_relay::operator;
use clap::Parser;
use tokio::net::TcpStream;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the chat client
#[derive(Parser, Debug)]
#[command(name = "chat-client")]
#[command(version = "0.1.0")]
#[command(about = "Connect to a chat-relay server", long_about = None)]
struct ClientArgs {
    /// Server hostname or IP address
    hostname: String,

    /// Server port
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let stream = TcpStream::connect((args.hostname.as_str(), args.port)).await?;
    info!(peer = %stream.peer_addr()?, "Connected");

    let console = Console::stdout();
    let mut lines = operator::stdin_lines();

    console.prompt("Input Handle: ");
    let handle = client::normalize_handle(&lines.recv().await.unwrap_or_default());

    let end = client::run(stream, &handle, &mut lines, &console).await?;
    match end {
        ClientEnd::LocalQuit => debug!("Quit by user"),
        ClientEnd::ServerLeft => debug!("Server ended the chat"),
    }
    Ok(())
}
