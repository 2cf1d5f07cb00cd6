// ============================================================================
// Order Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

// ============================================================================
// Value Objects
// ============================================================================

/// Limit price. Only meaningful for [`OrderType::Limit`].
pub type Price = Decimal;

/// Remaining quantity of an order.
pub type Quantity = Decimal;

/// Caller-assigned order identifier. The engine never generates or
/// deduplicates these.
pub type OrderId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Case-insensitive parse of `"buy"` / `"sell"`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if raw.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// The side this side trades against.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Executes at its price or better; any remainder rests on the book
    Limit,
    /// Executes against whatever liquidity exists; the remainder is discarded
    Market,
}

impl OrderType {
    /// Case-insensitive parse of `"limit"` / `"market"`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("limit") {
            Some(OrderType::Limit)
        } else if raw.eq_ignore_ascii_case("market") {
            Some(OrderType::Market)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Submission (as received)
// ============================================================================

/// An order as submitted by a client, before validation.
///
/// Type and side are kept as raw strings so they can be matched
/// case-insensitively; every field defaults so that incomplete payloads turn
/// into validation rejections rather than decode failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewOrder {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,

    /// Arrival time. Stamped on validation when absent.
    #[serde(
        rename = "Timestamp",
        alias = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(rename = "Price", alias = "price", with = "rust_decimal::serde::float")]
    pub price: Price,

    #[serde(
        rename = "Quantity",
        alias = "quantity",
        with = "rust_decimal::serde::float"
    )]
    pub quantity: Quantity,

    #[serde(rename = "Type", alias = "type")]
    pub order_type: String,

    #[serde(rename = "Side", alias = "side")]
    pub side: String,
}

impl NewOrder {
    pub fn new(
        id: impl Into<String>,
        order_type: impl Into<String>,
        side: impl Into<String>,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            price,
            quantity,
            order_type: order_type.into(),
            side: side.into(),
        }
    }

    pub fn limit(id: impl Into<String>, side: Side, price: Price, quantity: Quantity) -> Self {
        Self::new(id, OrderType::Limit.as_str(), side.as_str(), price, quantity)
    }

    /// Market orders carry no price.
    pub fn market(id: impl Into<String>, side: Side, quantity: Quantity) -> Self {
        Self::new(
            id,
            OrderType::Market.as_str(),
            side.as_str(),
            Decimal::ZERO,
            quantity,
        )
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Run the intake checks in order; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.parse().map(|_| ())
    }

    /// Validate and normalize into the canonical [`Order`].
    pub fn into_order(self) -> Result<Order, ValidationError> {
        let (order_type, side) = self.parse()?;
        Ok(Order {
            id: self.id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            price: self.price,
            quantity: self.quantity,
            order_type,
            side,
        })
    }

    fn parse(&self) -> Result<(OrderType, Side), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        let order_type = OrderType::parse(&self.order_type)
            .ok_or_else(|| ValidationError::InvalidType(self.order_type.clone()))?;
        let side =
            Side::parse(&self.side).ok_or_else(|| ValidationError::InvalidSide(self.side.clone()))?;
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        if order_type == OrderType::Limit && self.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice(self.price));
        }
        Ok((order_type, side))
    }
}

// ============================================================================
// Order Entity
// ============================================================================

/// A validated order. `quantity` is the remaining quantity and is only ever
/// decremented by fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "ID")]
    pub id: OrderId,

    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "Price", with = "rust_decimal::serde::float")]
    pub price: Price,

    #[serde(rename = "Quantity", with = "rust_decimal::serde::float")]
    pub quantity: Quantity,

    #[serde(rename = "Type")]
    pub order_type: OrderType,

    #[serde(rename = "Side")]
    pub side: Side,
}

impl Order {
    pub fn is_limit_order(&self) -> bool {
        self.order_type == OrderType::Limit
    }

    pub fn is_market_order(&self) -> bool {
        self.order_type == OrderType::Market
    }

    pub fn is_filled(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }

    /// Take `quantity` off the remaining amount.
    pub(crate) fn fill(&mut self, quantity: Quantity) {
        debug_assert!(quantity <= self.quantity, "overfill of order {}", self.id);
        self.quantity -= quantity;
    }
}

impl From<Order> for NewOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            timestamp: Some(order.timestamp),
            price: order.price,
            quantity: order.quantity,
            order_type: order.order_type.as_str().to_string(),
            side: order.side.as_str().to_string(),
        }
    }
}
