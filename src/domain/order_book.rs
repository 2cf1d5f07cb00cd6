// ============================================================================
// Order Book Domain Model
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slab::Slab;
use std::collections::{BTreeMap, VecDeque};

use super::{MatchEvent, Order, Price, Quantity, Side, ValidationError};

// ============================================================================
// Price Level
// ============================================================================

/// Resting orders at one price, oldest first.
///
/// The queue holds handles into the owning side's arena, so a partial fill
/// updates the stored order in place.
#[derive(Debug)]
pub struct PriceLevel {
    pub price: Price,
    queue: VecDeque<usize>,
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            queue: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Level total after adding `quantity`, or `None` if it overflows.
    fn total_with(&self, quantity: Quantity) -> Option<Quantity> {
        self.total_quantity.checked_add(quantity)
    }

}

// ============================================================================
// Order Book Side
// ============================================================================

/// One side of the book (bids or asks).
///
/// Levels are kept in a `BTreeMap` keyed by price; the best level is the
/// highest key for bids and the lowest for asks. A level is removed the
/// moment its queue empties, so every level in the map is non-empty.
#[derive(Debug)]
pub struct OrderBookSide {
    pub side: Side,
    levels: BTreeMap<Price, PriceLevel>,
    orders: Slab<Order>,
}

impl OrderBookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            orders: Slab::new(),
        }
    }

    /// Whether `quantity` more can rest at `price` without overflowing the
    /// level total.
    pub fn can_rest(&self, price: Price, quantity: Quantity) -> bool {
        self.levels
            .get(&price)
            .map_or(true, |level| level.total_with(quantity).is_some())
    }

    /// Append a resting order to the back of its price level, creating the
    /// level if needed. Nothing changes when the level total would overflow.
    pub fn add_order(&mut self, order: Order) -> Result<(), ValidationError> {
        debug_assert_eq!(order.side, self.side);
        debug_assert!(order.is_limit_order(), "only limit orders rest");

        let price = order.price;
        let quantity = order.quantity;
        let total = match self.levels.get(&price) {
            Some(level) => level
                .total_with(quantity)
                .ok_or(ValidationError::LevelOverflow { price, quantity })?,
            None => quantity,
        };

        let key = self.orders.insert(order);
        let level = self
            .levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price));
        level.queue.push_back(key);
        level.total_quantity = total;
        Ok(())
    }

    /// Get the best (top-of-book) price
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            // Highest bid (last in sorted order)
            Side::Buy => self.levels.keys().next_back().copied(),
            // Lowest ask (first in sorted order)
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Fill `aggressor` against the level at `price`, oldest order first,
    /// until either the aggressor or the level is exhausted.
    ///
    /// Each execution is passed to `on_match` as it happens. Fully filled
    /// resting orders leave the queue, and an emptied level leaves the map.
    pub fn fill_level(
        &mut self,
        price: Price,
        aggressor: &mut Order,
        mut on_match: impl FnMut(MatchEvent),
    ) {
        let Some(level) = self.levels.get_mut(&price) else {
            return;
        };

        while !aggressor.is_filled() {
            let Some(&key) = level.queue.front() else {
                break;
            };
            let resting = self
                .orders
                .get_mut(key)
                .expect("queued handle must point at a resting order");

            let matched = aggressor.quantity.min(resting.quantity);
            aggressor.fill(matched);
            resting.fill(matched);
            level.total_quantity -= matched;

            on_match(MatchEvent::new(aggressor, resting, price, matched));

            if resting.is_filled() {
                level.queue.pop_front();
                self.orders.remove(key);
            }
        }

        if level.is_empty() {
            self.levels.remove(&price);
        }
    }

    /// Levels best first.
    pub fn levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    /// Resting orders at `price`, oldest first.
    pub fn orders_at(&self, price: Price) -> impl Iterator<Item = &Order> + '_ {
        let orders = &self.orders;
        self.levels
            .get(&price)
            .into_iter()
            .flat_map(move |level| level.queue.iter().map(move |&key| &orders[key]))
    }

    pub fn contains_order(&self, order_id: &str) -> bool {
        self.orders.iter().any(|(_, order)| order.id == order_id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Get depth at N levels
    pub fn get_depth(&self, num_levels: usize) -> Vec<DepthLevel> {
        self.levels()
            .take(num_levels)
            .map(|level| DepthLevel {
                price: level.price,
                quantity: level.total_quantity,
                orders: level.order_count(),
            })
            .collect()
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Both sides of a single-instrument book.
#[derive(Debug)]
pub struct OrderBook {
    pub bids: OrderBookSide,
    pub asks: OrderBookSide,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: OrderBookSide::new(Side::Buy),
            asks: OrderBookSide::new(Side::Sell),
        }
    }

    /// Split into (own side, opposite side) for an order on `side`.
    pub fn sides_mut(&mut self, side: Side) -> (&mut OrderBookSide, &mut OrderBookSide) {
        match side {
            Side::Buy => (&mut self.bids, &mut self.asks),
            Side::Sell => (&mut self.asks, &mut self.bids),
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => ask.checked_sub(bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => midpoint(bid, ask),
            _ => None,
        }
    }

    /// True when best bid >= best ask. Never holds once a submission returns.
    pub fn is_crossed(&self) -> bool {
        matches!(self.spread(), Some(spread) if spread <= Decimal::ZERO)
    }
}

/// Halfway between two prices without forming their sum, so prices near
/// `Decimal::MAX` do not overflow.
fn midpoint(bid: Price, ask: Price) -> Option<Decimal> {
    let half_gap = ask.checked_sub(bid)? / Decimal::TWO;
    bid.checked_add(half_gap)
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Order Book Snapshot
// ============================================================================

/// Aggregated view of one price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Price,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Quantity,
    pub orders: usize,
}

/// Immutable snapshot of the order book state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub instrument: String,
    /// Bid levels, best (highest) first
    pub bids: Vec<DepthLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<DepthLevel>,
    /// Current spread (ask - bid)
    #[serde(with = "rust_decimal::serde::float_option")]
    pub spread: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub mid_price: Option<Decimal>,
}

impl OrderBookSnapshot {
    pub fn with_depth(instrument: String, bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> Self {
        let (spread, mid_price) = match (bids.first(), asks.first()) {
            (Some(bid), Some(ask)) => (
                ask.price.checked_sub(bid.price),
                midpoint(bid.price, ask.price),
            ),
            _ => (None, None),
        };

        Self {
            instrument,
            bids,
            asks,
            spread,
            mid_price,
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }

    /// Saturates at `Decimal::MAX`.
    pub fn total_bid_quantity(&self) -> Quantity {
        saturating_total(&self.bids)
    }

    /// Saturates at `Decimal::MAX`.
    pub fn total_ask_quantity(&self) -> Quantity {
        saturating_total(&self.asks)
    }
}

fn saturating_total(levels: &[DepthLevel]) -> Quantity {
    levels
        .iter()
        .fold(Decimal::ZERO, |total, level| total.saturating_add(level.quantity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewOrder;

    fn limit(id: &str, side: Side, price: i64, qty: i64) -> Order {
        NewOrder::limit(id, side, Decimal::from(price), Decimal::from(qty))
            .into_order()
            .unwrap()
    }

    #[test]
    fn test_price_level_totals() {
        let mut side = OrderBookSide::new(Side::Buy);
        side.add_order(limit("b1", Side::Buy, 50000, 1)).unwrap();
        side.add_order(limit("b2", Side::Buy, 50000, 2)).unwrap();

        let level = side.levels().next().unwrap();
        assert_eq!(level.total_quantity(), Decimal::from(3));
        assert_eq!(level.order_count(), 2);
        assert!(!level.is_empty());
    }

    #[test]
    fn test_best_price_per_side() {
        let mut bids = OrderBookSide::new(Side::Buy);
        bids.add_order(limit("b1", Side::Buy, 50000, 1)).unwrap();
        bids.add_order(limit("b2", Side::Buy, 50100, 1)).unwrap();
        bids.add_order(limit("b3", Side::Buy, 49900, 1)).unwrap();
        // Best bid should be highest price
        assert_eq!(bids.best_price(), Some(Decimal::from(50100)));

        let mut asks = OrderBookSide::new(Side::Sell);
        asks.add_order(limit("s1", Side::Sell, 50200, 1)).unwrap();
        asks.add_order(limit("s2", Side::Sell, 50150, 1)).unwrap();
        // Best ask should be lowest price
        assert_eq!(asks.best_price(), Some(Decimal::from(50150)));

        let depth: Vec<Price> = bids.levels().map(|level| level.price).collect();
        assert_eq!(
            depth,
            vec![Decimal::from(50100), Decimal::from(50000), Decimal::from(49900)]
        );
    }

    #[test]
    fn test_fill_level_fifo_and_pruning() {
        let mut asks = OrderBookSide::new(Side::Sell);
        asks.add_order(limit("s1", Side::Sell, 100, 1)).unwrap();
        asks.add_order(limit("s2", Side::Sell, 100, 2)).unwrap();

        let mut buy = limit("b1", Side::Buy, 100, 2);
        let mut events = Vec::new();
        asks.fill_level(Decimal::from(100), &mut buy, |event| events.push(event));

        assert!(buy.is_filled());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sell_order_id, "s1");
        assert_eq!(events[1].sell_order_id, "s2");
        assert_eq!(events[1].quantity, Decimal::ONE);

        // s2 keeps its place with the reduced quantity
        let remaining: Vec<&Order> = asks.orders_at(Decimal::from(100)).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "s2");
        assert_eq!(remaining[0].quantity, Decimal::ONE);
        assert!(!asks.contains_order("s1"));

        let mut sweep = limit("b2", Side::Buy, 100, 5);
        asks.fill_level(Decimal::from(100), &mut sweep, |_| {});
        assert_eq!(sweep.quantity, Decimal::from(4));
        assert!(asks.is_empty());
        assert_eq!(asks.order_count(), 0);
    }

    #[test]
    fn test_fill_level_missing_price_is_noop() {
        let mut asks = OrderBookSide::new(Side::Sell);
        let mut buy = limit("b1", Side::Buy, 100, 2);
        asks.fill_level(Decimal::from(100), &mut buy, |_| panic!("no match expected"));
        assert_eq!(buy.quantity, Decimal::from(2));
    }

    #[test]
    fn test_crossed_detection() {
        let mut book = OrderBook::new();
        assert!(!book.is_crossed());
        book.bids.add_order(limit("b1", Side::Buy, 100, 1)).unwrap();
        book.asks.add_order(limit("s1", Side::Sell, 101, 1)).unwrap();
        assert!(!book.is_crossed());
        assert_eq!(book.spread(), Some(Decimal::ONE));
        assert_eq!(book.mid_price(), Some(Decimal::new(1005, 1)));

        // Direct insertion bypasses matching, so a cross is visible here
        book.bids.add_order(limit("b2", Side::Buy, 101, 1)).unwrap();
        assert!(book.is_crossed());
    }

    #[test]
    fn test_level_overflow_leaves_level_untouched() {
        let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let order = |id: &str| {
            NewOrder::limit(id, Side::Sell, Decimal::ONE, huge)
                .into_order()
                .unwrap()
        };

        let mut asks = OrderBookSide::new(Side::Sell);
        asks.add_order(order("s1")).unwrap();
        assert!(!asks.can_rest(Decimal::ONE, huge));
        assert!(asks.can_rest(Decimal::TWO, huge));

        let err = asks.add_order(order("s2")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::LevelOverflow {
                price: Decimal::ONE,
                quantity: huge
            }
        );

        assert_eq!(asks.order_count(), 1);
        assert!(!asks.contains_order("s2"));
        let level = asks.levels().next().unwrap();
        assert_eq!(level.total_quantity(), huge);
        assert_eq!(level.order_count(), 1);
    }

    #[test]
    fn test_mid_price_near_decimal_max() {
        let bid = Decimal::from_i128_with_scale(40_000_000_000_000_000_000_000_000_000, 0);
        let ask = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let level = |price| DepthLevel {
            price,
            quantity: Decimal::MAX,
            orders: 1,
        };

        let snapshot = OrderBookSnapshot::with_depth(
            "BIG".to_string(),
            vec![level(bid), level(bid - Decimal::ONE)],
            vec![level(ask)],
        );
        assert_eq!(
            snapshot.mid_price,
            Some(Decimal::from_i128_with_scale(45_000_000_000_000_000_000_000_000_000, 0))
        );
        assert_eq!(snapshot.spread, Some(ask - bid));
        assert_eq!(snapshot.total_bid_quantity(), Decimal::MAX);

        let mut book = OrderBook::new();
        book.bids
            .add_order(NewOrder::limit("b", Side::Buy, bid, Decimal::ONE).into_order().unwrap())
            .unwrap();
        book.asks
            .add_order(NewOrder::limit("s", Side::Sell, ask, Decimal::ONE).into_order().unwrap())
            .unwrap();
        assert_eq!(book.mid_price(), snapshot.mid_price);
    }

    #[test]
    fn test_order_book_snapshot() {
        let snapshot = OrderBookSnapshot::with_depth(
            "BTC-USD".to_string(),
            vec![DepthLevel {
                price: Decimal::from(50000),
                quantity: Decimal::ONE,
                orders: 1,
            }],
            vec![DepthLevel {
                price: Decimal::from(50100),
                quantity: Decimal::from(2),
                orders: 2,
            }],
        );

        assert_eq!(snapshot.best_bid(), Some(Decimal::from(50000)));
        assert_eq!(snapshot.best_ask(), Some(Decimal::from(50100)));
        assert_eq!(snapshot.spread, Some(Decimal::from(100)));
        assert_eq!(snapshot.mid_price, Some(Decimal::from(50050)));
        assert_eq!(snapshot.total_ask_quantity(), Decimal::from(2));
    }
}
