// ============================================================================
// Domain Errors
// Rejection reasons for submitted orders and invalid book configuration
// ============================================================================

use rust_decimal::Decimal;
use thiserror::Error;

/// Why a submitted order was rejected before touching the book.
///
/// Variants are listed in the order the checks run; the first failing check
/// is the one reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing order ID")]
    MissingId,

    #[error("invalid order type: {0:?}")]
    InvalidType(String),

    #[error("invalid side: {0:?}")]
    InvalidSide(String),

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("limit order must have positive price, got {0}")]
    NonPositivePrice(Decimal),

    #[error("price {price} is not a multiple of tick size {tick_size}")]
    PriceOffTick { price: Decimal, tick_size: Decimal },

    #[error("quantity {quantity} is not a multiple of lot size {lot_size}")]
    QuantityOffLot { quantity: Decimal, lot_size: Decimal },

    #[error("resting quantity at price {price} cannot absorb another {quantity}")]
    LevelOverflow { price: Decimal, quantity: Decimal },
}

/// Invalid [`BookConfig`](super::BookConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("instrument cannot be empty")]
    EmptyInstrument,

    #[error("tick size must be positive, got {0}")]
    NonPositiveTickSize(Decimal),

    #[error("lot size must be positive, got {0}")]
    NonPositiveLotSize(Decimal),
}
