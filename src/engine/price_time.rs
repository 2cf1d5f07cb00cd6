// ============================================================================
// Price/Time Priority Matching (FIFO)
// Best price first; within a price, earliest arrival first
// ============================================================================

use crate::domain::{MatchEvent, Order, OrderBookSide, OrderType, Price, Side};

/// Whether `aggressor` will trade at `level_price`.
///
/// A buy accepts levels at or below its limit, a sell at or above it.
/// Market orders accept any price.
pub fn prices_cross(aggressor: &Order, level_price: Price) -> bool {
    match (aggressor.order_type, aggressor.side) {
        (OrderType::Market, _) => true,
        (OrderType::Limit, Side::Buy) => level_price <= aggressor.price,
        (OrderType::Limit, Side::Sell) => level_price >= aggressor.price,
    }
}

/// Match `aggressor` against `opposite` until it is filled, the opposite
/// side runs dry, or the best remaining level is out of its limit.
///
/// Levels are sorted, so the first unacceptable level ends matching.
///
/// # Example
/// ```text
/// Book:  100 @ 1 (s1, t=1)
///        100 @ 2 (s2, t=2)
///        101 @ 1 (s3, t=3)
///
/// Incoming: Buy 2 @ 100
/// Result: 1 with s1, then 1 with s2 (s2 keeps 1); s3 untouched
/// ```
pub fn match_order(
    aggressor: &mut Order,
    opposite: &mut OrderBookSide,
    mut on_match: impl FnMut(MatchEvent),
) {
    debug_assert_eq!(opposite.side, aggressor.side.opposite());

    while !aggressor.is_filled() {
        let Some(best_price) = opposite.best_price() else {
            break;
        };

        if !prices_cross(aggressor, best_price) {
            break;
        }

        opposite.fill_level(best_price, aggressor, &mut on_match);
    }
}
