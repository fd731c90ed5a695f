//! Order book state: ordered price level maps, per-exchange books and the
//! cross-exchange aggregate book.

use std::collections::BTreeMap;
use rust_decimal::prelude::*;

use crate::core::Side;


/// The way prices are ordered within one side of a book:
/// within _ask_ sides the best price is the lowest,
/// within _bid_ sides, it is the other way around.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Ranking {
    /// Prices iterate from the lowest first
    LessFirst,
    /// Prices iterate from the highest first
    GreaterFirst,
}

/// An ordered mapping from price to quantity for one side of a book.
/// Never stores a zero quantity: a zero-quantity update removes the level.
#[derive(PartialEq, Debug)]
pub struct PriceLevelMap {
    ranking: Ranking,
    levels: BTreeMap<Decimal, Decimal>,
}

impl PriceLevelMap {
    pub fn new(ranking: Ranking) -> Self {
        Self { ranking, levels: BTreeMap::new() }
    }

    /// Insert or overwrite the level at `price`. The quantity must be
    /// positive; callers route zero quantities through [apply](Self::apply).
    pub fn upsert(&mut self, price: Decimal, quantity: Decimal) {
        assert!(quantity > Decimal::ZERO, "upsert requires a positive quantity");
        self.levels.insert(price, quantity);
    }

    /// Remove the level at `price`. Removing an absent price is not an error.
    pub fn remove(&mut self, price: Decimal) {
        self.levels.remove(&price);
    }

    /// Single entry point used by books: a zero quantity removes the level,
    /// any other quantity overwrites it.
    pub fn apply(&mut self, price: Decimal, quantity: Decimal) {
        if quantity.is_zero() {
            self.remove(price);
        } else {
            self.upsert(price, quantity);
        }
    }

    /// The quantity stored at `price`, if any.
    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// The best level: highest price for `GreaterFirst`, lowest for `LessFirst`.
    pub fn best(&self) -> Option<(Decimal, Decimal)> {
        let entry = match self.ranking {
            Ranking::LessFirst => self.levels.iter().next(),
            Ranking::GreaterFirst => self.levels.iter().next_back(),
        };
        entry.map(|(&price, &quantity)| (price, quantity))
    }

    /// Walk the levels from best to worst. Each call re-walks the current
    /// state, so a fresh iterator reflects the latest mutations.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Decimal, Decimal)> + '_> {
        let pairs = self.levels.iter().map(|(&price, &quantity)| (price, quantity));
        match self.ranking {
            Ranking::LessFirst => Box::new(pairs),
            Ranking::GreaterFirst => Box::new(pairs.rev()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// The most recent authoritative book state reported by a single exchange.
/// Updates replace the prior quantity at a price, they do not add to it.
#[derive(PartialEq, Debug)]
pub struct SourceBook {
    bids: PriceLevelMap,
    asks: PriceLevelMap,
}

impl SourceBook {
    pub fn new() -> Self {
        Self {
            bids: PriceLevelMap::new(Ranking::GreaterFirst),
            asks: PriceLevelMap::new(Ranking::LessFirst),
        }
    }

    /// Route one normalized update to the side it belongs to. Pure
    /// delegation: the book stores exactly what the exchange reports.
    pub fn apply_update(&mut self, side: Side, price: Decimal, quantity: Decimal) {
        self.side(side).apply(price, quantity);
    }

    fn side(&mut self, side: Side) -> &mut PriceLevelMap {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &PriceLevelMap {
        &self.bids
    }

    pub fn asks(&self) -> &PriceLevelMap {
        &self.asks
    }
}

impl Default for SourceBook {
    fn default() -> Self {
        Self::new()
    }
}

/// The union book across all exchanges. A non-zero update adds to the
/// running total at that price; a zero update deletes the whole level,
/// including quantity contributed by other exchanges. No per-exchange
/// ledger is kept, so a removed level cannot restore another exchange's
/// residual contribution.
#[derive(PartialEq, Debug)]
pub struct AggregateBook {
    bids: PriceLevelMap,
    asks: PriceLevelMap,
}

impl AggregateBook {
    pub fn new() -> Self {
        Self {
            bids: PriceLevelMap::new(Ranking::GreaterFirst),
            asks: PriceLevelMap::new(Ranking::LessFirst),
        }
    }

    /// Apply one normalized update with additive semantics:
    /// `new_total = existing_total + quantity` when the price is already
    /// present, else `quantity`; zero deletes the level entirely.
    pub fn apply_update(&mut self, side: Side, price: Decimal, quantity: Decimal) {
        let map = self.side(side);
        if quantity.is_zero() {
            map.remove(price);
        } else {
            let total = map.get(price).unwrap_or(Decimal::ZERO) + quantity;
            map.upsert(price, total);
        }
    }

    fn side(&mut self, side: Side) -> &mut PriceLevelMap {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &PriceLevelMap {
        &self.bids
    }

    pub fn asks(&self) -> &PriceLevelMap {
        &self.asks
    }
}

impl Default for AggregateBook {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_map_apply_never_stores_zero() {
        let mut map = PriceLevelMap::new(Ranking::GreaterFirst);
        map.apply(dec("100"), dec("2"));
        map.apply(dec("101"), dec("0"));
        map.apply(dec("100"), dec("0"));
        map.apply(dec("99"), dec("1"));
        map.apply(dec("99"), dec("0"));
        assert!(map.iter().all(|(_, quantity)| !quantity.is_zero()));
        assert!(map.is_empty());
    }

    #[test]
    fn test_map_remove_absent_is_idempotent() {
        let mut map = PriceLevelMap::new(Ranking::LessFirst);
        map.remove(dec("100"));
        map.upsert(dec("100"), dec("1"));
        map.remove(dec("100"));
        map.remove(dec("100"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_map_iterates_bids_descending_for_any_insertion_order() {
        let mut map = PriceLevelMap::new(Ranking::GreaterFirst);
        for price in ["97", "101", "95", "100", "99"] {
            map.upsert(dec(price), dec("1"));
        }
        let prices: Vec<Decimal> = map.iter().map(|(price, _)| price).collect();
        assert_eq!(prices, vec![dec("101"), dec("100"), dec("99"), dec("97"), dec("95")]);
    }

    #[test]
    fn test_map_iterates_asks_ascending_for_any_insertion_order() {
        let mut map = PriceLevelMap::new(Ranking::LessFirst);
        for price in ["104", "101", "106", "102"] {
            map.upsert(dec(price), dec("1"));
        }
        let prices: Vec<Decimal> = map.iter().map(|(price, _)| price).collect();
        assert_eq!(prices, vec![dec("101"), dec("102"), dec("104"), dec("106")]);
    }

    #[test]
    fn test_map_best_per_ranking() {
        let mut bids = PriceLevelMap::new(Ranking::GreaterFirst);
        let mut asks = PriceLevelMap::new(Ranking::LessFirst);
        assert_eq!(bids.best(), None);
        assert_eq!(asks.best(), None);
        for price in ["100", "99", "101"] {
            bids.upsert(dec(price), dec("1"));
            asks.upsert(dec(price), dec("1"));
        }
        assert_eq!(bids.best(), Some((dec("101"), dec("1"))));
        assert_eq!(asks.best(), Some((dec("99"), dec("1"))));
    }

    #[test]
    fn test_map_iteration_restarts_on_current_state() {
        let mut map = PriceLevelMap::new(Ranking::LessFirst);
        map.upsert(dec("100"), dec("1"));
        assert_eq!(map.iter().count(), 1);
        map.upsert(dec("101"), dec("2"));
        map.remove(dec("100"));
        let levels: Vec<(Decimal, Decimal)> = map.iter().collect();
        assert_eq!(levels, vec![(dec("101"), dec("2"))]);
    }

    #[test]
    fn test_source_book_replaces_quantity_at_price() {
        let mut book = SourceBook::new();
        book.apply_update(Side::Bid, dec("100"), dec("2"));
        book.apply_update(Side::Bid, dec("100"), dec("2"));
        assert_eq!(book.bids().get(dec("100")), Some(dec("2")));
        book.apply_update(Side::Bid, dec("100"), dec("7"));
        assert_eq!(book.bids().get(dec("100")), Some(dec("7")));
    }

    #[test]
    fn test_source_book_update_sequence() {
        let mut book = SourceBook::new();
        book.apply_update(Side::Bid, dec("100"), dec("2"));
        book.apply_update(Side::Bid, dec("101"), dec("1"));
        book.apply_update(Side::Bid, dec("100"), dec("0"));
        let bids: Vec<(Decimal, Decimal)> = book.bids().iter().collect();
        assert_eq!(bids, vec![(dec("101"), dec("1"))]);
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_source_book_routes_by_side() {
        let mut book = SourceBook::new();
        book.apply_update(Side::Bid, dec("100"), dec("1"));
        book.apply_update(Side::Ask, dec("102"), dec("3"));
        assert_eq!(book.bids().best(), Some((dec("100"), dec("1"))));
        assert_eq!(book.asks().best(), Some((dec("102"), dec("3"))));
    }

    #[test]
    fn test_aggregate_book_adds_quantity_at_price() {
        let mut book = AggregateBook::new();
        book.apply_update(Side::Bid, dec("100"), dec("2"));
        book.apply_update(Side::Bid, dec("100"), dec("3"));
        assert_eq!(book.bids().get(dec("100")), Some(dec("5")));
        book.apply_update(Side::Bid, dec("100"), dec("0"));
        assert!(book.bids().is_empty());
    }

    // The same update applied twice leaves a source book unchanged but
    // doubles the aggregate level. The books are deliberately asymmetric.
    #[test]
    fn test_replace_vs_additive_asymmetry() {
        let mut source = SourceBook::new();
        let mut aggregate = AggregateBook::new();
        for _ in 0..2 {
            source.apply_update(Side::Ask, dec("50"), dec("4"));
            aggregate.apply_update(Side::Ask, dec("50"), dec("4"));
        }
        assert_eq!(source.asks().get(dec("50")), Some(dec("4")));
        assert_eq!(aggregate.asks().get(dec("50")), Some(dec("8")));
    }

    #[test]
    fn test_aggregate_zero_deletes_level_despite_other_contributors() {
        let mut book = AggregateBook::new();
        // Two exchanges contribute at the same price.
        book.apply_update(Side::Ask, dec("50"), dec("1"));
        book.apply_update(Side::Ask, dec("50"), dec("1"));
        assert_eq!(book.asks().get(dec("50")), Some(dec("2")));
        // One exchange removing its level wipes the whole price, residuals
        // included. No per-exchange ledger exists to recover them.
        book.apply_update(Side::Ask, dec("50"), dec("0"));
        assert_eq!(book.asks().get(dec("50")), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_aggregate_concurrent_increments_lose_no_update() {
        let book = Arc::new(RwLock::new(AggregateBook::new()));
        let mut tasks = vec![];
        for _ in 0..2 {
            let book = Arc::clone(&book);
            tasks.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let mut book = book.write().await;
                    book.apply_update(Side::Ask, dec("50"), dec("1"));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(book.read().await.asks().get(dec("50")), Some(dec("200")));
    }
}
