// ============================================================================
// Order Book Configuration
// Instrument identity and optional price/quantity increments
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ValidationError};
use super::Order;

/// Configuration for a single-instrument book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    /// The trading instrument (e.g., "BTC-USD", "AAPL")
    pub instrument: String,

    /// Optional: Price tick size (minimum price increment)
    /// None means no tick size enforcement
    pub tick_size: Option<Decimal>,

    /// Optional: Lot size (minimum quantity increment)
    /// None means no lot size enforcement
    pub lot_size: Option<Decimal>,
}

impl BookConfig {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            tick_size: None,
            lot_size: None,
        }
    }

    /// Builder method: Set price tick size
    pub fn with_tick_size(mut self, tick: Decimal) -> Self {
        self.tick_size = Some(tick);
        self
    }

    /// Builder method: Set lot size
    pub fn with_lot_size(mut self, lot: Decimal) -> Self {
        self.lot_size = Some(lot);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.is_empty() {
            return Err(ConfigError::EmptyInstrument);
        }

        if let Some(tick) = self.tick_size {
            if tick <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveTickSize(tick));
            }
        }

        if let Some(lot) = self.lot_size {
            if lot <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveLotSize(lot));
            }
        }

        Ok(())
    }

    /// Increment checks that run after the intake checks. Tick size only
    /// applies to limit prices. A zero increment matches nothing.
    pub fn check_increments(&self, order: &Order) -> Result<(), ValidationError> {
        if let Some(tick_size) = self.tick_size {
            if order.is_limit_order() && !is_multiple(order.price, tick_size) {
                return Err(ValidationError::PriceOffTick {
                    price: order.price,
                    tick_size,
                });
            }
        }

        if let Some(lot_size) = self.lot_size {
            if !is_multiple(order.quantity, lot_size) {
                return Err(ValidationError::QuantityOffLot {
                    quantity: order.quantity,
                    lot_size,
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Preset Configurations (Factory Methods)
// ============================================================================

impl BookConfig {
    /// Equity-style book
    /// - Tick size: $0.01
    /// - Whole-share lots
    pub fn equity_style(instrument: impl Into<String>) -> Self {
        Self::new(instrument)
            .with_tick_size(Decimal::new(1, 2)) // $0.01
            .with_lot_size(Decimal::ONE)
    }

    /// Crypto-style book
    /// - No tick size
    /// - Lot size: 0.00000001 (satoshi)
    pub fn crypto_style(instrument: impl Into<String>) -> Self {
        Self::new(instrument).with_lot_size(Decimal::new(1, 8))
    }
}

impl Default for BookConfig {
    fn default() -> Self {
        Self::new("DEFAULT")
    }
}

fn is_multiple(value: Decimal, increment: Decimal) -> bool {
    value
        .checked_rem(increment)
        .map_or(false, |rest| rest.is_zero())
}
