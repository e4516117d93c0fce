//! Deterministic rule checks

pub mod amount;
pub mod card;

pub use amount::{AmountCheck, AmountHeuristics};
pub use card::{CardCheck, CardValidator};
