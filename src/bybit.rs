//! Bybit WebSocket adapter for the v5 public spot order book channel.

use log::debug;
use serde::Deserialize;

use crate::core::*;
use crate::exchange::{BookUpdateReader, BookUpdateSource};


const BYBIT_CODE: &str = "bybit";
const BYBIT_WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";


/// Bybit implementation of the message parser [BookUpdateReader](BookUpdateReader).
struct BybitBookUpdateReader;

impl BookUpdateReader for BybitBookUpdateReader {
    fn read_book_update(&self, value: &str) -> Option<BookUpdate> {
        // Subscription acks carry no `data` field and fail to parse here.
        let parse_res: serde_json::Result<BybitBookMessage> = serde_json::from_str(value);
        match parse_res.map(BookUpdate::try_from) {
            Ok(Ok(book_update)) => Some(book_update),
            _ => {
                debug!("Parse failed {:?}", value);
                None
            }
        }
    }
}

/// Bybit implementation of the exchange adapter [BookUpdateSource](BookUpdateSource).
pub struct BybitBookUpdateSource {
    subscribe_msg: String,
}

impl BybitBookUpdateSource {
    pub fn new(product: &CurrencyPair) -> Self {
        let product_code = product.to_string().to_uppercase();
        let subscribe_msg = format!(r#"{{"op":"subscribe","args":["orderbook.50.{}"]}}"#, product_code);
        Self { subscribe_msg }
    }
}

impl BookUpdateSource for BybitBookUpdateSource {
    fn ws_url(&self) -> String {
        String::from(BYBIT_WS_URL)
    }

    fn subscribe_message(&self) -> Option<String> {
        Some(self.subscribe_msg.clone())
    }

    fn make_book_update_reader(&self) -> Box<dyn BookUpdateReader> {
        Box::new(BybitBookUpdateReader)
    }

    fn exchange_code(&self) -> &'static str {
        BYBIT_CODE
    }
}

#[derive(Deserialize, Debug)]
struct BybitBookData {
    #[serde(rename = "b")]
    bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    asks: Vec<(String, String)>,
}

#[derive(Deserialize, Debug)]
struct BybitBookMessage {
    data: BybitBookData,
}

impl TryFrom<BybitBookMessage> for BookUpdate {
    type Error = FeedError;

    fn try_from(value: BybitBookMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            exchange_code: BYBIT_CODE,
            bids: read_levels(&value.data.bids)?,
            asks: read_levels(&value.data.asks)?,
        })
    }
}

fn read_levels(pairs: &[(String, String)]) -> Result<Vec<PriceQty>, FeedError> {
    pairs.iter()
        .map(|(price_str, quantity_str)| PriceQty::try_from_strs(price_str, quantity_str))
        .collect()
}
