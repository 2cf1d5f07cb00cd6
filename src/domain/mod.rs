// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod config;
pub mod errors;
pub mod order;
pub mod order_book;
pub mod trade;

pub use config::BookConfig;
pub use errors::{ConfigError, ValidationError};
pub use order::{NewOrder, Order, OrderId, OrderType, Price, Quantity, Side};
pub use order_book::{DepthLevel, OrderBook, OrderBookSide, OrderBookSnapshot, PriceLevel};
pub use trade::MatchEvent;
