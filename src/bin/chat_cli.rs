//! Terminal client for the HopeLine chat route
//!
//! Reads one message per line, streams the reply as it arrives and keeps the
//! conversation history for follow-up turns. `--html` also prints the
//! rendered reply. `/reset` starts over, `/quit`
//! exits.

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hopeline::chat::{ChatMessage, ChatStreamConsumer, IncrementalMarkdown};

#[derive(Parser, Debug)]
#[command(name = "hopeline-chat", version)]
#[command(about = "Talk to the HopeLine assistant from a terminal")]
struct Cli {
    /// Chat endpoint of a running server
    #[arg(long, env = "HOPELINE_CHAT_URL", default_value = "http://localhost:8080/api/gemini-chat")]
    url: String,

    /// Also print each finished reply rendered as HTML
    #[arg(long)]
    html: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopeline=error".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let consumer = ChatStreamConsumer::new(&cli.url)?;
    let mut history: Vec<ChatMessage> = Vec::new();

    println!("HopeLine chat. You are not alone. Type /quit to leave.");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {
                prompt()?;
                continue;
            }
            "/quit" => break,
            "/reset" => {
                history.clear();
                println!("(conversation cleared)");
                prompt()?;
                continue;
            }
            _ => {}
        }

        history.push(ChatMessage::user(line));

        let mut printed = 0;
        let mut markdown = IncrementalMarkdown::new();
        let reply = consumer
            .send(&history, |text| {
                if let Some(fresh) = text.get(printed..) {
                    print!("{}", fresh);
                    let _ = std::io::stdout().flush();
                }
                printed = text.len();
                if cli.html {
                    markdown.update(text);
                }
            })
            .await;
        println!();
        if cli.html && !markdown.html().is_empty() {
            println!("--- html ---\n{}", markdown.html().trim_end());
        }

        if let Some(error) = &reply.error {
            eprintln!("! {}", error);
        }
        if reply.text.is_empty() {
            // Nothing to remember; let the user retry the same turn
            history.pop();
        } else {
            history.push(ChatMessage::assistant(reply.text));
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}
