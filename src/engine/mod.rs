// ============================================================================
// Engine Module
// Contains the core matching engine business logic
// ============================================================================

mod matching_engine;

pub mod factory;
pub mod price_time;

pub use factory::{create_from_config, MatchingEngineBuilder};
pub use matching_engine::{FillStatus, MatchingEngine, SubmitReport};
