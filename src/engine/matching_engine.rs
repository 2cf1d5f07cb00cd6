// ============================================================================
// Matching Engine
// Single serialized entry point for every book mutation
// ============================================================================

use crate::domain::{
    BookConfig, ConfigError, MatchEvent, NewOrder, Order, OrderBook, OrderBookSnapshot, OrderId,
    OrderType, Price, Quantity, Side, ValidationError,
};
use crate::engine::price_time;
use crate::interfaces::EventNotifier;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

// ============================================================================
// Submission Result
// ============================================================================

/// How a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Fully executed, nothing left
    Filled,
    /// No execution; the whole order rests
    Rested,
    /// Partly executed, the limit remainder rests
    PartiallyFilledRested,
    /// Partly executed, the market remainder was discarded
    PartiallyFilledDiscarded,
    /// Market order that found no liquidity at all
    Unfilled,
}

/// Outcome of one accepted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub order_id: OrderId,

    /// Executions in the order they happened
    pub matches: SmallVec<[MatchEvent; 4]>,

    /// The booked remainder, for limit orders that did not fully fill
    pub rested: Option<Order>,

    /// Market remainder that found no liquidity
    pub discarded: Quantity,
}

impl SubmitReport {
    pub fn filled_quantity(&self) -> Quantity {
        self.matches.iter().map(|m| m.quantity).sum()
    }

    pub fn is_filled(&self) -> bool {
        self.rested.is_none() && self.discarded.is_zero()
    }

    pub fn status(&self) -> FillStatus {
        match (self.matches.is_empty(), &self.rested, self.discarded.is_zero()) {
            (false, None, true) => FillStatus::Filled,
            (true, Some(_), _) => FillStatus::Rested,
            (false, Some(_), _) => FillStatus::PartiallyFilledRested,
            (false, None, false) => FillStatus::PartiallyFilledDiscarded,
            (true, None, _) => FillStatus::Unfilled,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Price/time priority matching engine for one instrument.
///
/// All validation, matching and booking for a submission happens under one
/// exclusive lock, so the order in which callers acquire it is the
/// authoritative processing order. Notifier callbacks run under that same
/// lock.
pub struct MatchingEngine {
    config: BookConfig,

    book: Mutex<OrderBook>,

    notifier: Arc<dyn EventNotifier>,
}

impl MatchingEngine {
    /// Create a new matching engine. Fails if `config` does not validate.
    pub fn new(
        config: BookConfig,
        notifier: Arc<dyn EventNotifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            book: Mutex::new(OrderBook::new()),
            notifier,
        })
    }

    /// Submit an order: validate, match against the opposite side, then book
    /// any limit remainder.
    ///
    /// A rejected order touches nothing and emits no notifier event.
    pub fn submit(&self, order: impl Into<NewOrder>) -> Result<SubmitReport, ValidationError> {
        let request = order.into();
        let mut book = self.book.lock();
        let start = Instant::now();

        let mut order = match self.accept(&book, request) {
            Ok(order) => order,
            Err((order_id, reason)) => {
                warn!(order_id = %order_id, %reason, "order rejected");
                return Err(reason);
            }
        };

        debug!(
            order_id = %order.id,
            side = %order.side,
            order_type = %order.order_type,
            price = %order.price,
            qty = %order.quantity,
            "processing order"
        );

        let mut report = SubmitReport {
            order_id: order.id.clone(),
            matches: SmallVec::new(),
            rested: None,
            discarded: Decimal::ZERO,
        };

        let (own, opposite) = book.sides_mut(order.side);

        price_time::match_order(&mut order, opposite, |event| {
            debug!(
                buy_order_id = %event.buy_order_id,
                sell_order_id = %event.sell_order_id,
                price = %event.price,
                qty = %event.quantity,
                "fill executed"
            );
            self.notifier.on_match(&event);
            report.matches.push(event);
        });

        if !order.is_filled() {
            match order.order_type {
                OrderType::Limit => {
                    own.add_order(order.clone())
                        .expect("level capacity is checked before matching");
                    self.notifier.on_add(&order);
                    report.rested = Some(order);
                }
                OrderType::Market => {
                    debug!(
                        order_id = %order.id,
                        unfilled = %order.quantity,
                        "market order remainder discarded"
                    );
                    report.discarded = order.quantity;
                }
            }
        }

        debug_assert!(!book.is_crossed(), "book left crossed");
        trace!(
            order_id = %report.order_id,
            processing_time_ns = start.elapsed().as_nanos() as u64,
            matches = report.matches.len(),
            "order processing completed"
        );

        Ok(report)
    }

    /// Get order book snapshot, best levels first
    pub fn get_snapshot(&self, depth: usize) -> OrderBookSnapshot {
        let book = self.book.lock();
        OrderBookSnapshot::with_depth(
            self.config.instrument.clone(),
            book.bids.get_depth(depth),
            book.asks.get_depth(depth),
        )
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.book.lock().bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.book.lock().asks.best_price()
    }

    /// Get spread
    pub fn get_spread(&self) -> Option<Decimal> {
        self.book.lock().spread()
    }

    /// Get mid price
    pub fn get_mid_price(&self) -> Option<Decimal> {
        self.book.lock().mid_price()
    }

    /// Whether an order with this ID is resting on either side. Linear in
    /// the number of resting orders.
    pub fn contains_order(&self, order_id: &str) -> bool {
        let book = self.book.lock();
        book.bids.contains_order(order_id) || book.asks.contains_order(order_id)
    }

    pub fn resting_order_count(&self) -> usize {
        let book = self.book.lock();
        book.bids.order_count() + book.asks.order_count()
    }

    /// Get the instrument name
    pub fn get_instrument(&self) -> &str {
        &self.config.instrument
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Run `f` against the locked book. For inspection in tests and tools.
    pub fn with_book<R>(&self, f: impl FnOnce(&OrderBook) -> R) -> R {
        f(&self.book.lock())
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    /// Every check that can refuse an order runs here, before matching,
    /// so a rejection never leaves a partial execution behind.
    fn accept(
        &self,
        book: &OrderBook,
        request: NewOrder,
    ) -> Result<Order, (String, ValidationError)> {
        let order_id = request.id.clone();
        let order = request.into_order().map_err(|e| (order_id.clone(), e))?;
        self.config
            .check_increments(&order)
            .map_err(|e| (order_id.clone(), e))?;

        // Fills only shrink the remainder, so this covers whatever rests
        let own = match order.side {
            Side::Buy => &book.bids,
            Side::Sell => &book.asks,
        };
        if order.is_limit_order() && !own.can_rest(order.price, order.quantity) {
            return Err((
                order_id,
                ValidationError::LevelOverflow {
                    price: order.price,
                    quantity: order.quantity,
                },
            ));
        }
        Ok(order)
    }
}
