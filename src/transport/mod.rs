// ============================================================================
// Transport Module
// Wire format, event fan-out and the WebSocket server
// ============================================================================

pub mod config;
pub mod hub;
pub mod wire;

#[cfg(feature = "server")]
pub mod server;

pub use config::{HubConfig, TransportConfig, TransportConfigError};
pub use hub::{BroadcastHub, Frame, HubWorker, Subscription};
pub use wire::{decode_inbound, encode, InboundMessage, OutboundMessage, WireError};
