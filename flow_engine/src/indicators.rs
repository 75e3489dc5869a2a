//! Per-indicator state machines built from `models`.  Each one consumes
//! ticks and bar closes and emits one output record per bar.

pub mod cofi;
pub mod divergence;
pub mod ofi;
pub mod vwap;

pub use cofi::{CofiIndicator, CofiOutput};
pub use divergence::{DivergenceIndicator, DivergenceOutput};
pub use ofi::{OfiHistogram, OfiOutput, OfiStrength};
pub use vwap::{AnchoredVwap, VwapIndicator, VwapOutput};
