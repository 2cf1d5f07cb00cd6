// ============================================================================
// Wire Format
// JSON messages exchanged with WebSocket clients
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{MatchEvent, NewOrder, Order, ValidationError};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message has no \"type\" field")]
    MissingType,
}

/// Message type that carries an order submission. Anything else is ignored.
pub const NEW_ORDER: &str = "new_order";

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub payload: Value,
}

impl InboundMessage {
    pub fn new_order(order: &NewOrder) -> Result<Self, WireError> {
        Ok(Self {
            kind: NEW_ORDER.to_string(),
            payload: serde_json::to_value(order)?,
        })
    }
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Match { event: MatchEvent },
    OrderAdded { order: Order },
    /// Sent only to the connection that submitted the order
    OrderRejected { order_id: String, reason: String },
}

impl OutboundMessage {
    pub fn rejected(order_id: impl Into<String>, reason: &ValidationError) -> Self {
        OutboundMessage::OrderRejected {
            order_id: order_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Decode one inbound text frame.
///
/// Returns `Ok(None)` when `type` is anything other than the string
/// `new_order`, including non-string values. The payload is only decoded
/// for `new_order`, so unknown message types never fail on their payload
/// shape.
pub fn decode_inbound(text: &str) -> Result<Option<NewOrder>, WireError> {
    let value: Value = serde_json::from_str(text)?;
    match value.get("type") {
        None => return Err(WireError::MissingType),
        Some(Value::String(kind)) if kind == NEW_ORDER => {}
        Some(_) => return Ok(None),
    }

    let message: InboundMessage = serde_json::from_value(value)?;
    let order = serde_json::from_value(message.payload)?;
    Ok(Some(order))
}

pub fn encode(message: &OutboundMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}
