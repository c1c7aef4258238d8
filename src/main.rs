//! chat-relay server binary.
//!
//! Usage: `chat-relay <port>`

use chat_relay::config::Config;
use chat_relay::console::Console;
use chat_relay::operator::{self, Operator};
use chat_relay::server::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging. Stdout carries the chat, so logs go to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        backlog = config.backlog,
        max_sessions = ?config.max_sessions,
        max_frame_size = ?config.max_frame_size,
        "Starting chat-relay server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let console = Console::stdout();
    let operator = Operator::spawn(console.clone(), operator::stdin_lines());
    let server = Server::bind(&config, console, operator)?;
    server.run(shutdown_signal()).await
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
