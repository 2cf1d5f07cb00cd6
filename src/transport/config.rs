// ============================================================================
// Transport Configuration
// Listener, session limits and fan-out queue sizes
// ============================================================================

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportConfigError {
    #[error("{name} has invalid value {value:?}")]
    InvalidVar { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("ping interval {ping:?} must be shorter than read timeout {read:?}")]
    PingNotBeforeDeadline { ping: Duration, read: Duration },
}

/// Queue sizes for the broadcast hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Events waiting for the fan-out thread; a full queue drops new events
    pub queue_capacity: usize,

    /// Messages buffered per subscriber; a subscriber that falls this far
    /// behind is disconnected
    pub subscriber_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            subscriber_capacity: 256,
        }
    }
}

/// Settings for the WebSocket server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub listen_addr: String,
    pub instrument: String,
    pub ws_path: String,
    pub health_path: String,
    /// Inbound frames larger than this close the session
    pub max_message_bytes: usize,
    /// Session is closed when nothing arrives for this long
    pub read_timeout: Duration,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub hub: HubConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            instrument: "DEFAULT".to_string(),
            ws_path: "/ws".to_string(),
            health_path: "/healthz".to_string(),
            max_message_bytes: 512,
            read_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(50),
            write_timeout: Duration::from_secs(10),
            hub: HubConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Defaults overridden by `ORDERBOOK_*` environment variables.
    pub fn from_env() -> Result<Self, TransportConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TransportConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("ORDERBOOK_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(instrument) = lookup("ORDERBOOK_INSTRUMENT") {
            config.instrument = instrument;
        }
        if let Some(n) = parse_var(&lookup, "ORDERBOOK_MAX_MESSAGE_BYTES")? {
            config.max_message_bytes = n;
        }
        if let Some(secs) = parse_var(&lookup, "ORDERBOOK_READ_TIMEOUT_SECS")? {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "ORDERBOOK_PING_INTERVAL_SECS")? {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "ORDERBOOK_WRITE_TIMEOUT_SECS")? {
            config.write_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var(&lookup, "ORDERBOOK_HUB_QUEUE")? {
            config.hub.queue_capacity = n;
        }
        if let Some(n) = parse_var(&lookup, "ORDERBOOK_SUBSCRIBER_QUEUE")? {
            config.hub.subscriber_capacity = n;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TransportConfigError> {
        if self.max_message_bytes == 0 {
            return Err(TransportConfigError::Zero("max_message_bytes"));
        }
        if self.hub.queue_capacity == 0 {
            return Err(TransportConfigError::Zero("hub.queue_capacity"));
        }
        if self.hub.subscriber_capacity == 0 {
            return Err(TransportConfigError::Zero("hub.subscriber_capacity"));
        }
        if self.ping_interval >= self.read_timeout {
            return Err(TransportConfigError::PingNotBeforeDeadline {
                ping: self.ping_interval,
                read: self.read_timeout,
            });
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, TransportConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TransportConfigError::InvalidVar { name, value: raw }),
    }
}
