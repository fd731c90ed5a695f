//! Binance WebSocket adapter: incremental depth updates from the combined
//! stream endpoint. The channel is encoded in the URL, so no subscription
//! message is needed.

use log::debug;
use serde::Deserialize;

use crate::core::*;
use crate::exchange::{BookUpdateReader, BookUpdateSource};


const BINANCE_CODE: &str = "binance";


/// Binance implementation of the message parser [BookUpdateReader](BookUpdateReader).
struct BinanceBookUpdateReader;

impl BookUpdateReader for BinanceBookUpdateReader {
    fn read_book_update(&self, value: &str) -> Option<BookUpdate> {
        let parse_res: serde_json::Result<BinanceDepthUpdate> = serde_json::from_str(value);
        match parse_res.map(BookUpdate::try_from) {
            Ok(Ok(book_update)) => Some(book_update),
            _ => {
                debug!("Parse failed {:?}", value);
                None
            }
        }
    }
}

/// Binance implementation of the exchange adapter [BookUpdateSource](BookUpdateSource).
pub struct BinanceBookUpdateSource {
    ws_url: String,
}

impl BinanceBookUpdateSource {
    pub fn new(product: &CurrencyPair) -> Self {
        let product_code = product.to_string().to_lowercase();
        let ws_url = format!("wss://stream.binance.com:443/ws/{}@depth@100ms", product_code);
        Self { ws_url }
    }
}

impl BookUpdateSource for BinanceBookUpdateSource {
    fn ws_url(&self) -> String {
        self.ws_url.clone()
    }

    fn subscribe_message(&self) -> Option<String> {
        None
    }

    fn make_book_update_reader(&self) -> Box<dyn BookUpdateReader> {
        Box::new(BinanceBookUpdateReader)
    }

    fn exchange_code(&self) -> &'static str {
        BINANCE_CODE
    }
}

#[derive(Deserialize, Debug)]
struct BinanceDepthUpdate {
    #[serde(rename = "b")]
    bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    asks: Vec<(String, String)>,
}

impl TryFrom<BinanceDepthUpdate> for BookUpdate {
    type Error = FeedError;

    fn try_from(value: BinanceDepthUpdate) -> Result<Self, Self::Error> {
        Ok(Self {
            exchange_code: BINANCE_CODE,
            bids: read_levels(&value.bids)?,
            asks: read_levels(&value.asks)?,
        })
    }
}

fn read_levels(pairs: &[(String, String)]) -> Result<Vec<PriceQty>, FeedError> {
    pairs.iter()
        .map(|(price_str, quantity_str)| PriceQty::try_from_strs(price_str, quantity_str))
        .collect()
}
