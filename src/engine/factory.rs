// ============================================================================
// Matching Engine Factory
// Creates matching engines with validated configuration
// ============================================================================

use crate::domain::{BookConfig, ConfigError};
use crate::engine::MatchingEngine;
use crate::interfaces::EventNotifier;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Creates a matching engine from configuration
///
/// # Example
/// ```
/// use realtime_order_book::prelude::*;
/// use std::sync::Arc;
///
/// let config = BookConfig::equity_style("AAPL");
/// let engine = create_from_config(config, Arc::new(NoOpNotifier)).unwrap();
/// assert_eq!(engine.get_instrument(), "AAPL");
/// ```
pub fn create_from_config(
    config: BookConfig,
    notifier: Arc<dyn EventNotifier>,
) -> Result<MatchingEngine, ConfigError> {
    MatchingEngine::new(config, notifier)
}

/// Builder for creating matching engines with fluent API
///
/// # Example
/// ```
/// use realtime_order_book::prelude::*;
/// use rust_decimal::Decimal;
/// use std::sync::Arc;
///
/// let engine = MatchingEngineBuilder::new("BTC-USD")
///     .with_tick_size(Decimal::new(1, 2))
///     .build(Arc::new(NoOpNotifier))
///     .unwrap();
/// ```
pub struct MatchingEngineBuilder {
    config: BookConfig,
}

impl MatchingEngineBuilder {
    /// Create a new builder for the specified instrument
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            config: BookConfig::new(instrument),
        }
    }

    pub fn from_config(config: BookConfig) -> Self {
        Self { config }
    }

    /// Set price tick size
    pub fn with_tick_size(mut self, tick: Decimal) -> Self {
        self.config = self.config.with_tick_size(tick);
        self
    }

    /// Set lot size
    pub fn with_lot_size(mut self, lot: Decimal) -> Self {
        self.config = self.config.with_lot_size(lot);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self, notifier: Arc<dyn EventNotifier>) -> Result<MatchingEngine, ConfigError> {
        create_from_config(self.config, notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::NoOpNotifier;

    #[test]
    fn test_builder_applies_increments() {
        let engine = MatchingEngineBuilder::new("ETH-USD")
            .with_tick_size(Decimal::new(1, 1))
            .with_lot_size(Decimal::new(1, 3))
            .build(Arc::new(NoOpNotifier))
            .unwrap();

        assert_eq!(engine.get_instrument(), "ETH-USD");
        assert_eq!(engine.config().tick_size, Some(Decimal::new(1, 1)));
        assert_eq!(engine.config().lot_size, Some(Decimal::new(1, 3)));
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let result = MatchingEngineBuilder::new("")
            .build(Arc::new(NoOpNotifier));
        assert!(matches!(result, Err(ConfigError::EmptyInstrument)));

        let result = create_from_config(
            BookConfig::new("X").with_lot_size(Decimal::ZERO),
            Arc::new(NoOpNotifier),
        );
        assert!(matches!(result, Err(ConfigError::NonPositiveLotSize(_))));
    }
}
