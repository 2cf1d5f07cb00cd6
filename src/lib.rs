// ============================================================================
// Realtime Order Book Library
// Price/time priority matching for a single instrument with event fan-out
// ============================================================================

//! # Realtime Order Book
//!
//! A limit order book for one instrument that matches incoming orders
//! against resting liquidity under price/time priority.
//!
//! ## Features
//!
//! - **Price/time priority**: best price first, FIFO within a price level
//! - **Limit and market orders**: limit remainders rest, market remainders are discarded
//! - **Typed rejections** for malformed orders instead of silent drops
//! - **Pluggable notifier** that observes every match and every resting order
//! - **WebSocket server** (feature `server`) broadcasting events to all clients
//!
//! ## Example
//!
//! ```rust
//! use realtime_order_book::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let engine = MatchingEngine::new(BookConfig::new("BTC-USD"), Arc::new(NoOpNotifier))
//!     .expect("valid config");
//!
//! engine
//!     .submit(NewOrder::limit("s1", Side::Sell, Decimal::from(100), Decimal::from(5)))
//!     .unwrap();
//!
//! let report = engine
//!     .submit(NewOrder::limit("b1", Side::Buy, Decimal::from(101), Decimal::from(3)))
//!     .unwrap();
//!
//! assert_eq!(report.matches.len(), 1);
//! assert_eq!(report.matches[0].price, Decimal::from(100));
//! assert_eq!(report.status(), FillStatus::Filled);
//!
//! let snapshot = engine.get_snapshot(10);
//! assert_eq!(snapshot.best_ask(), Some(Decimal::from(100)));
//! assert_eq!(snapshot.total_ask_quantity(), Decimal::from(2));
//! ```

pub mod domain;
pub mod engine;
pub mod interfaces;
pub mod transport;

#[cfg(feature = "logging")]
pub mod telemetry;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        BookConfig, ConfigError, DepthLevel, MatchEvent, NewOrder, Order, OrderBookSnapshot,
        OrderId, OrderType, Price, Quantity, Side, ValidationError,
    };
    pub use crate::engine::{
        create_from_config, FillStatus, MatchingEngine, MatchingEngineBuilder, SubmitReport,
    };
    pub use crate::interfaces::{EventNotifier, LoggingNotifier, NoOpNotifier};
    pub use crate::transport::{BroadcastHub, HubConfig};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use crate::transport::wire::OutboundMessage;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn read_frames(subscription: &crate::transport::Subscription, n: usize) -> Vec<Value> {
        (0..n)
            .map(|_| {
                let frame = subscription
                    .receiver
                    .recv_timeout(Duration::from_secs(2))
                    .unwrap();
                serde_json::from_str(&frame).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_matching() {
        let (hub, worker) = BroadcastHub::start(&HubConfig::default()).unwrap();
        let feed = hub.subscribe();
        let engine = create_from_config(BookConfig::new("BTC-USD"), hub.clone()).unwrap();

        engine
            .submit(NewOrder::limit("s1", Side::Sell, Decimal::from(100), Decimal::from(5)))
            .unwrap();
        let report = engine
            .submit(NewOrder::limit("b1", Side::Buy, Decimal::from(101), Decimal::from(7)))
            .unwrap();
        assert_eq!(report.status(), FillStatus::PartiallyFilledRested);

        let frames = read_frames(&feed, 3);
        assert_eq!(frames[0]["type"], "order_added");
        assert_eq!(frames[0]["order"]["ID"], "s1");

        assert_eq!(frames[1]["type"], "match");
        assert_eq!(frames[1]["event"]["buy_order_id"], "b1");
        assert_eq!(frames[1]["event"]["sell_order_id"], "s1");
        assert_eq!(frames[1]["event"]["price"], 100.0);
        assert_eq!(frames[1]["event"]["quantity"], 5.0);

        // Remainder rests with the reduced quantity
        assert_eq!(frames[2]["type"], "order_added");
        assert_eq!(frames[2]["order"]["ID"], "b1");
        assert_eq!(frames[2]["order"]["Quantity"], 2.0);

        let snapshot = engine.get_snapshot(10);
        assert!(snapshot.asks.is_empty());
        assert_eq!(snapshot.best_bid(), Some(Decimal::from(101)));

        drop(engine);
        drop(hub);
        worker.join();
    }

    #[test]
    fn test_market_sweep_reports_discarded_remainder() {
        let engine = MatchingEngineBuilder::new("ETH-USD").build(Arc::new(NoOpNotifier)).unwrap();

        engine
            .submit(NewOrder::limit("s1", Side::Sell, Decimal::from(10), Decimal::from(2)))
            .unwrap();
        engine
            .submit(NewOrder::limit("s2", Side::Sell, Decimal::from(11), Decimal::from(2)))
            .unwrap();

        let report = engine
            .submit(NewOrder::market("m1", Side::Buy, Decimal::from(6)))
            .unwrap();

        let prices: Vec<Decimal> = report.matches.iter().map(|m| m.price).collect();
        assert_eq!(prices, vec![Decimal::from(10), Decimal::from(11)]);
        assert_eq!(report.filled_quantity(), Decimal::from(4));
        assert_eq!(report.discarded, Decimal::from(2));
        assert_eq!(report.status(), FillStatus::PartiallyFilledDiscarded);
        assert_eq!(engine.resting_order_count(), 0);
        assert!(!engine.contains_order("m1"));
    }

    #[test]
    fn test_rejection_message_for_invalid_order() {
        let engine =
            MatchingEngine::new(BookConfig::new("BTC-USD"), Arc::new(NoOpNotifier)).unwrap();

        let err = engine
            .submit(NewOrder::new("x1", "stop", "buy", Decimal::ONE, Decimal::ONE))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidType("stop".to_string()));

        let message = OutboundMessage::rejected("x1", &err);
        let value: Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "order_rejected");
        assert_eq!(value["order_id"], "x1");
        assert_eq!(engine.resting_order_count(), 0);
    }
}
