//! Strategy engine: turns a composite signal into a bet decision.

pub mod confidence;

pub use confidence::{percentage, ConfidencePolicy};
