// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod event_notifier;

pub use event_notifier::{EventNotifier, LoggingNotifier, NoOpNotifier};

#[cfg(test)]
pub(crate) use event_notifier::testing;
