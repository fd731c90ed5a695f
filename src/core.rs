//! Shared leaf types: trading sides, instruments, normalized price levels
//! and feed errors.

use std::fmt::{Display, Formatter};
use rust_decimal::prelude::*;
use serde::Serialize;


/// A side of a trading book.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Side {
    Bid,
    Ask,
}

/// The instrument traded on all connected exchanges.
#[derive(PartialEq, Debug, Clone)]
pub struct CurrencyPair {
    pub main: String,
    pub counter: String,
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.main, self.counter)
    }
}

/// A normalized price level: the quantity an exchange currently offers at
/// a price. A zero quantity means the level is gone.
#[derive(Serialize, PartialEq, Debug, Clone)]
pub struct PriceQty {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceQty {
    /// Checked conversion from the string fields exchanges put on the
    /// wire. Prices must be positive and quantities non-negative; any
    /// failure rejects the whole message the level came from.
    pub fn try_from_strs(price_str: &str, quantity_str: &str) -> Result<PriceQty, FeedError> {
        let price = Decimal::from_str(price_str).map_err(|_| FeedError::Parse)?;
        let quantity = Decimal::from_str(quantity_str).map_err(|_| FeedError::Parse)?;
        if price <= Decimal::ZERO || quantity < Decimal::ZERO {
            return Err(FeedError::Parse);
        }
        Ok(PriceQty { price, quantity })
    }

    #[cfg(test)]
    pub fn from_strs(price_str: &str, quantity_str: &str) -> PriceQty {
        PriceQty {
            price: Decimal::from_str(price_str).unwrap(),
            quantity: Decimal::from_str(quantity_str).unwrap(),
        }
    }
}

/// A batch of normalized level updates decoded from one exchange message.
/// Levels are applied in the order they appear, bids first.
#[derive(PartialEq, Debug)]
pub struct BookUpdate {
    pub exchange_code: &'static str,
    pub bids: Vec<PriceQty>,
    pub asks: Vec<PriceQty>,
}

#[derive(Debug)]
pub enum FeedError {
    Io,
    Subscription,
    Parse,
}
