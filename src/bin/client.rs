//! WebSocket chat client for the mesh chat bridge.
//!
//! Connects to a bridge, announces the given name, and sends stdin lines as
//! chat messages. Reconnects automatically on disconnection (max 5 attempts
//! with 5 second interval). Slash commands:
//!
//! - `/channel <name>` switches the current channel
//! - `/name <name>` changes the display name
//! - `/quit` exits
//!
//! Run with:
//! ```not_rust
//! cargo run --bin client -- --name Alice
//! cargo run --bin client -- -n Bob -u ws://127.0.0.1:8080
//! ```

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use meshchat_client::logger::setup_logger;
use meshchat_client::{ChatClient, ChatMessage, ClientConfig, FixedBackoff};

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "WebSocket chat client for the mesh chat bridge", long_about = None)]
struct Args {
    /// Display name (restricted to [A-Za-z0-9_])
    #[arg(short = 'n', long)]
    name: String,

    /// WebSocket bridge URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080")]
    url: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = ClientConfig::new(args.url).with_reconnect(FixedBackoff::default());
    let mut client = ChatClient::new(config);
    client.connect();
    client.set_identity(&args.name);

    // Follow snapshot updates and print new log entries.
    let mut snapshots = client.subscribe();
    let printer = tokio::spawn(async move {
        let mut seen = 0usize;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            for entry in &snapshot.log[seen..] {
                println!("{}", format_entry(entry));
            }
            seen = snapshot.log.len();
        }
    });

    // Rustyline is synchronous; run it on its own thread and forward lines.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    while let Some(line) = input_rx.recv().await {
        if let Some(channel) = line.strip_prefix("/channel ") {
            client.change_channel(channel.trim());
        } else if let Some(name) = line.strip_prefix("/name ") {
            client.set_identity(name.trim());
        } else if line == "/quit" {
            break;
        } else {
            client.send(&line);
        }
    }

    client.shutdown().await;
    printer.abort();
}

fn format_entry(entry: &ChatMessage) -> String {
    match entry {
        ChatMessage::Text {
            author,
            content,
            channel,
        } => format!("[{}] {}: {}", channel, author, content),
        ChatMessage::Join(user) => format!("* {} joins the room", user),
        ChatMessage::Channels(list) => format!("* channels: {}", list.join(", ")),
        ChatMessage::CurrentServer(name) => format!("* connected to {}", name),
    }
}
