mod render;
mod wire;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use shopchat::ChatRequest;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use wire::{Incoming, Wire};

/// Talk to a running chat server from the terminal.
///
/// Type free text to chat, `/<action>` to press a button by value, a number
/// to pick one of the options just shown, or `/quit` to leave.
#[derive(Debug, Parser)]
#[command(name = "shopper", version)]
struct Args {
    #[arg(long, env = "SHOPPER_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// API key for servers started with `--require-token`.
    #[arg(long, env = "SHOPCHAT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut wire = Wire::new(&args.server, args.api_key);
    wire.authenticate().await?;

    let mut options = show(&wire.init().await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let Some(request) = to_request(line, &options) else {
            println!("!! no option {} here", line);
            continue;
        };

        match wire.send(&request).await {
            Ok(messages) => options = show(&messages),
            // Previous options stay active.
            Err(e) => println!("!! {:#}", e),
        }
    }

    Ok(())
}

/// Print a reply and return the option values it offered. When several
/// messages carry options, the last one wins.
fn show(messages: &[Incoming]) -> Vec<String> {
    let mut offered = Vec::new();
    for message in messages {
        let (text, values) = render::render(message);
        println!("{}", text);
        if !values.is_empty() {
            offered = values;
        }
    }
    offered
}

fn to_request(line: &str, options: &[String]) -> Option<ChatRequest> {
    if let Some(action) = line.strip_prefix('/') {
        return Some(ChatRequest::action(action));
    }
    match line.parse::<usize>() {
        Ok(n) => options
            .get(n.checked_sub(1)?)
            .map(|value| ChatRequest::action(value.as_str())),
        Err(_) => Some(ChatRequest::message(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_maps_to_requests() {
        let options = vec!["category_headphones".to_string(), "category_speakers".to_string()];

        assert_eq!(
            to_request("/featured_products", &options),
            Some(ChatRequest::action("featured_products"))
        );
        assert_eq!(
            to_request("2", &options),
            Some(ChatRequest::action("category_speakers"))
        );
        assert_eq!(to_request("0", &options), None);
        assert_eq!(to_request("3", &options), None);
        assert_eq!(
            to_request("anything cheap?", &options),
            Some(ChatRequest::message("anything cheap?"))
        );
    }
}
