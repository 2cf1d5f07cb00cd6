// ============================================================================
// Event Notifier Interface
// Defines the contract the engine reports trades and book additions through
// ============================================================================

use crate::domain::{MatchEvent, Order};

/// Receives engine events synchronously, while the book lock is held.
///
/// Calls arrive in exactly the order the book was mutated. Implementations
/// must not block: anything slow (serialization fan-out, network writes)
/// belongs behind a bounded queue drained elsewhere. A delivery failure is
/// the implementation's problem and never affects book state.
pub trait EventNotifier: Send + Sync {
    /// Called once per executed trade.
    fn on_match(&self, event: &MatchEvent);

    /// Called once when a limit remainder is booked, with the order as it
    /// rests (quantity already reduced by any fills).
    fn on_add(&self, order: &Order);
}

/// No-op notifier for testing
pub struct NoOpNotifier;

impl EventNotifier for NoOpNotifier {
    fn on_match(&self, _event: &MatchEvent) {}

    fn on_add(&self, _order: &Order) {}
}

/// Logging notifier
pub struct LoggingNotifier;

impl EventNotifier for LoggingNotifier {
    fn on_match(&self, event: &MatchEvent) {
        tracing::info!(
            buy_order_id = %event.buy_order_id,
            sell_order_id = %event.sell_order_id,
            price = %event.price,
            qty = %event.quantity,
            "match"
        );
    }

    fn on_add(&self, order: &Order) {
        tracing::info!(
            order_id = %order.id,
            side = %order.side,
            price = %order.price,
            qty = %order.quantity,
            "order added"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Recorded, RecordingNotifier};
    use super::*;
    use crate::domain::{NewOrder, Side};
    use rust_decimal::Decimal;

    #[test]
    fn test_noop_and_logging_notifiers() {
        let order = NewOrder::limit("o1", Side::Buy, Decimal::from(10), Decimal::ONE)
            .into_order()
            .unwrap();
        // Should not panic
        NoOpNotifier.on_add(&order);
        LoggingNotifier.on_add(&order);
    }

    #[test]
    fn test_recording_keeps_order() {
        let buy = NewOrder::limit("b", Side::Buy, Decimal::from(10), Decimal::ONE)
            .into_order()
            .unwrap();
        let sell = NewOrder::limit("s", Side::Sell, Decimal::from(10), Decimal::ONE)
            .into_order()
            .unwrap();
        let event = MatchEvent::new(&buy, &sell, Decimal::from(10), Decimal::ONE);

        let notifier = RecordingNotifier::default();
        notifier.on_add(&sell);
        notifier.on_match(&event);

        assert_eq!(
            notifier.events(),
            vec![Recorded::Added(sell), Recorded::Match(event)]
        );
    }
}
