//! Point-in-time, band-filtered exports of book state, and the document
//! published to subscribers on each tick.

use std::collections::BTreeMap;
use rust_decimal::prelude::*;
use serde::Serialize;

use crate::book::{AggregateBook, PriceLevelMap, SourceBook};
use crate::core::PriceQty;


/// Band half-width around the best price: levels further than 1% away
/// are excluded from snapshots.
fn bid_floor_factor() -> Decimal {
    Decimal::new(99, 2)
}

fn ask_cap_factor() -> Decimal {
    Decimal::new(101, 2)
}

/// The bid levels within 1% of the best bid, best first. An empty map
/// yields an empty sequence. Iteration runs best-outward, so the walk
/// stops at the first level outside the band.
pub fn filter_bids(bids: &PriceLevelMap) -> Vec<PriceQty> {
    match bids.best() {
        None => vec![],
        Some((best, _)) => {
            let floor = best * bid_floor_factor();
            bids.iter()
                .take_while(|&(price, _)| price >= floor)
                .map(|(price, quantity)| PriceQty { price, quantity })
                .collect()
        }
    }
}

/// The ask levels within 1% of the best ask, best first.
pub fn filter_asks(asks: &PriceLevelMap) -> Vec<PriceQty> {
    match asks.best() {
        None => vec![],
        Some((best, _)) => {
            let cap = best * ask_cap_factor();
            asks.iter()
                .take_while(|&(price, _)| price <= cap)
                .map(|(price, quantity)| PriceQty { price, quantity })
                .collect()
        }
    }
}

/// Both filtered sides of one book at publish time.
#[derive(Serialize, PartialEq, Debug)]
pub struct BookSnapshot {
    pub bids: Vec<PriceQty>,
    pub asks: Vec<PriceQty>,
}

impl BookSnapshot {
    pub fn of_source(book: &SourceBook) -> Self {
        Self {
            bids: filter_bids(book.bids()),
            asks: filter_asks(book.asks()),
        }
    }

    pub fn of_aggregate(book: &AggregateBook) -> Self {
        Self {
            bids: filter_bids(book.bids()),
            asks: filter_asks(book.asks()),
        }
    }
}

/// The full document published each tick: one snapshot per named book,
/// one per exchange plus the aggregate. Owned values only, with no
/// back-reference to the books they were read from.
pub type SnapshotDocument = BTreeMap<String, BookSnapshot>;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Ranking;
    use crate::core::Side;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_filter_empty_maps() {
        let bids = PriceLevelMap::new(Ranking::GreaterFirst);
        let asks = PriceLevelMap::new(Ranking::LessFirst);
        assert_eq!(filter_bids(&bids), vec![]);
        assert_eq!(filter_asks(&asks), vec![]);
    }

    #[test]
    fn test_filter_bids_keeps_band_near_best() {
        let mut bids = PriceLevelMap::new(Ranking::GreaterFirst);
        bids.upsert(dec("100"), dec("1"));
        bids.upsert(dec("99"), dec("5"));
        bids.upsert(dec("95"), dec("2"));
        let filtered = filter_bids(&bids);
        assert_eq!(filtered, vec![
            PriceQty::from_strs("100", "1"),
            PriceQty::from_strs("99", "5"),
        ]);
    }

    #[test]
    fn test_filter_bids_band_boundary_is_inclusive() {
        let mut bids = PriceLevelMap::new(Ranking::GreaterFirst);
        bids.upsert(dec("100"), dec("1"));
        bids.upsert(dec("99.0"), dec("2"));
        bids.upsert(dec("98.99"), dec("3"));
        let prices: Vec<Decimal> = filter_bids(&bids).into_iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec("100"), dec("99.0")]);
    }

    #[test]
    fn test_filter_asks_keeps_band_near_best() {
        let mut asks = PriceLevelMap::new(Ranking::LessFirst);
        asks.upsert(dec("100"), dec("1"));
        asks.upsert(dec("100.5"), dec("5"));
        asks.upsert(dec("101"), dec("4"));
        asks.upsert(dec("101.01"), dec("2"));
        asks.upsert(dec("105"), dec("2"));
        let filtered = filter_asks(&asks);
        assert_eq!(filtered, vec![
            PriceQty::from_strs("100", "1"),
            PriceQty::from_strs("100.5", "5"),
            PriceQty::from_strs("101", "4"),
        ]);
    }

    #[test]
    fn test_source_snapshot_orders_best_first() {
        let mut book = SourceBook::new();
        book.apply_update(Side::Bid, dec("99.5"), dec("2"));
        book.apply_update(Side::Bid, dec("100"), dec("1"));
        book.apply_update(Side::Ask, dec("100.5"), dec("3"));
        book.apply_update(Side::Ask, dec("100.2"), dec("4"));
        let snapshot = BookSnapshot::of_source(&book);
        assert_eq!(snapshot.bids, vec![
            PriceQty::from_strs("100", "1"),
            PriceQty::from_strs("99.5", "2"),
        ]);
        assert_eq!(snapshot.asks, vec![
            PriceQty::from_strs("100.2", "4"),
            PriceQty::from_strs("100.5", "3"),
        ]);
    }

    #[test]
    fn test_snapshot_serializes_as_named_books() {
        let mut book = SourceBook::new();
        book.apply_update(Side::Bid, dec("100"), dec("1"));
        let mut document = SnapshotDocument::new();
        document.insert("binance".to_string(), BookSnapshot::of_source(&book));
        document.insert("aggregate".to_string(), BookSnapshot::of_aggregate(&AggregateBook::new()));
        let json = serde_json::to_string(&document).unwrap();
        assert_eq!(
            json,
            r#"{"aggregate":{"bids":[],"asks":[]},"binance":{"bids":[{"price":"100","quantity":"1"}],"asks":[]}}"#
        );
    }
}
