//! OKX WebSocket adapter for the v5 public `books` channel. OKX levels
//! carry four fields; only price and quantity are used.

use log::debug;
use serde::Deserialize;

use crate::core::*;
use crate::exchange::{BookUpdateReader, BookUpdateSource};


const OKX_CODE: &str = "okx";
const OKX_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";


/// OKX implementation of the message parser [BookUpdateReader](BookUpdateReader).
struct OkxBookUpdateReader;

impl BookUpdateReader for OkxBookUpdateReader {
    fn read_book_update(&self, value: &str) -> Option<BookUpdate> {
        let parse_res: serde_json::Result<OkxBookMessage> = serde_json::from_str(value);
        match parse_res.map(BookUpdate::try_from) {
            Ok(Ok(book_update)) => Some(book_update),
            _ => {
                debug!("Parse failed {:?}", value);
                None
            }
        }
    }
}

/// OKX implementation of the exchange adapter [BookUpdateSource](BookUpdateSource).
pub struct OkxBookUpdateSource {
    subscribe_msg: String,
}

impl OkxBookUpdateSource {
    pub fn new(product: &CurrencyPair) -> Self {
        let inst_id = format!("{}-{}", product.main.to_uppercase(), product.counter.to_uppercase());
        let subscribe_msg = format!(
            r#"{{"op":"subscribe","args":[{{"channel":"books","instId":"{}"}}]}}"#,
            inst_id
        );
        Self { subscribe_msg }
    }
}

impl BookUpdateSource for OkxBookUpdateSource {
    fn ws_url(&self) -> String {
        String::from(OKX_WS_URL)
    }

    fn subscribe_message(&self) -> Option<String> {
        Some(self.subscribe_msg.clone())
    }

    fn make_book_update_reader(&self) -> Box<dyn BookUpdateReader> {
        Box::new(OkxBookUpdateReader)
    }

    fn exchange_code(&self) -> &'static str {
        OKX_CODE
    }
}

#[derive(Deserialize, Debug)]
struct OkxBookData {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
}

#[derive(Deserialize, Debug)]
struct OkxBookMessage {
    data: Vec<OkxBookData>,
}

impl TryFrom<OkxBookMessage> for BookUpdate {
    type Error = FeedError;

    fn try_from(value: OkxBookMessage) -> Result<Self, Self::Error> {
        let entry = value.data.into_iter().next().ok_or(FeedError::Parse)?;
        Ok(Self {
            exchange_code: OKX_CODE,
            bids: read_levels(&entry.bids)?,
            asks: read_levels(&entry.asks)?,
        })
    }
}

fn read_levels(levels: &[Vec<String>]) -> Result<Vec<PriceQty>, FeedError> {
    levels.iter()
        .map(|fields| match (fields.first(), fields.get(1)) {
            (Some(price_str), Some(quantity_str)) => {
                PriceQty::try_from_strs(price_str, quantity_str)
            }
            _ => Err(FeedError::Parse),
        })
        .collect()
}
