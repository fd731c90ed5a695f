//! Simple subscriber printing a number of snapshot documents from a
//! running relay server.

use std::env;
use log::{LevelFilter, info};
use simple_logger::SimpleLogger;
use futures::prelude::*;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use orderbook_relay::cli::ArgParser;


const USAGE_MESSAGE: &str = "Usage: client <#messages> [port]";


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new().with_level(LevelFilter::Info).init().unwrap();
    let mut arg_parser = ArgParser::new(env::args(), USAGE_MESSAGE);
    let message_num = arg_parser.extract_message_num();
    let port = arg_parser.extract_port();
    let server_url = format!("ws://127.0.0.1:{}", port);
    let (ws, _) = connect_async(server_url.as_str()).await?;
    info!("Streaming {} snapshots from {}", message_num, server_url);
    let mut messages = ws.take(message_num);
    while let Some(message) = messages.next().await {
        if let Message::Text(text) = message? {
            info!("Received: {}", text);
        }
    }
    Ok(())
}
