//! Order-flow analytics for a single instrument series.
//!
//! The host pushes trades and bar closes into [`engine::OrderFlowEngine`];
//! everything below it is plain incremental state owned by that engine.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod models;

pub use config::EngineConfig;
pub use data::{Bar, PriceSource, Tick};
pub use engine::{BarSnapshot, OrderFlowEngine, ProfileLevels};
pub use error::{FlowError, Result};
