// ============================================================================
// Match Event Domain Model
// ============================================================================

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Order, OrderId, Price, Quantity, Side};

/// One execution between an aggressor and a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub buy_order_id: OrderId,

    pub sell_order_id: OrderId,

    /// The resting level's price; any improvement over the aggressor's
    /// limit goes to the aggressor.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Price,

    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Quantity,

    /// Emission time, whole seconds, UTC
    #[serde(with = "rfc3339_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl MatchEvent {
    /// Build the event for `quantity` traded between `aggressor` and
    /// `resting` at `price`, stamped now.
    pub fn new(aggressor: &Order, resting: &Order, price: Price, quantity: Quantity) -> Self {
        let (buy, sell) = match aggressor.side {
            Side::Buy => (aggressor, resting),
            Side::Sell => (resting, aggressor),
        };

        Self {
            buy_order_id: buy.id.clone(),
            sell_order_id: sell.id.clone(),
            price,
            quantity,
            timestamp: Utc::now().trunc_subsecs(0),
        }
    }

    /// Notional value of the trade (price * quantity)
    pub fn notional_value(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}

mod rfc3339_seconds {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
