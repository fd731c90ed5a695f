//! WebSocket relay server: mirrors one book per exchange plus their
//! cross-exchange union, and pushes band-filtered snapshots of all of
//! them to subscribers on a fixed cadence.

use log::{LevelFilter, info};
use simple_logger::SimpleLogger;
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tokio::time::Duration;

use orderbook_relay::book::{AggregateBook, SourceBook};
use orderbook_relay::cli::ArgParser;
use orderbook_relay::dispatch::Dispatcher;
use orderbook_relay::exchange::{run_feed, BookUpdateSource, FeedBooks};
use orderbook_relay::publish::{publish_channel, serve_subscribers};
use orderbook_relay::binance::BinanceBookUpdateSource;
use orderbook_relay::bybit::BybitBookUpdateSource;
use orderbook_relay::okx::OkxBookUpdateSource;


const USAGE_MESSAGE: &str = "Usage: server <currency pair> [port] [tick ms]";


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new().with_level(LevelFilter::Info).init().unwrap();
    let mut arg_parser = ArgParser::new(env::args(), USAGE_MESSAGE);
    let product = arg_parser.extract_currency_pair();
    let port = arg_parser.extract_port();
    let tick = Duration::from_millis(arg_parser.extract_tick_ms());

    let adapters: Vec<Box<dyn BookUpdateSource>> = vec![
        Box::new(BinanceBookUpdateSource::new(&product)),
        Box::new(BybitBookUpdateSource::new(&product)),
        Box::new(OkxBookUpdateSource::new(&product)),
    ];

    let aggregate = Arc::new(RwLock::new(AggregateBook::new()));
    let (stop_sender, stop_receiver) = watch::channel(false);
    let (publisher, _) = publish_channel();

    let mut sources = vec![];
    for adapter in adapters {
        let source = Arc::new(RwLock::new(SourceBook::new()));
        sources.push((adapter.exchange_code().to_string(), Arc::clone(&source)));
        let books = FeedBooks { source, aggregate: Arc::clone(&aggregate) };
        tokio::spawn(run_feed(adapter, books, stop_receiver.clone()));
    }

    let dispatcher = Dispatcher::new(sources, Arc::clone(&aggregate), publisher.clone(), tick);
    tokio::spawn(dispatcher.run(stop_receiver.clone()));

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Serving subscribers on port {}", port);
    tokio::spawn(serve_subscribers(listener, publisher, stop_receiver));

    tokio::signal::ctrl_c().await?;
    info!("Stop signal received");
    let _ = stop_sender.send(true);
    // Give the feed tasks a moment to close their transports.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
