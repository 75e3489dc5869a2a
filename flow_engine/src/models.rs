//! Leaf computations.  Each module owns one incremental state machine or a
//! set of pure functions; the indicators and the engine compose them.

pub mod aggressor;
pub mod classifier;
pub mod cvd;
pub mod moments;
pub mod moving_average;
pub mod order_flow;
pub mod profile;
pub mod regression;
pub mod session;
pub mod session_stats;
pub mod tpo;
pub mod volume_profile;
pub mod weighting;

pub use classifier::{ClassificationMethod, TradeClassifier, TradeSide};
pub use moments::{Band, MomentWeight, RunningMomentStats};
pub use moving_average::{MaType, MovingAverage};
pub use order_flow::{calculate_ofi, OrderFlowAccumulator, OrderFlowBar};
pub use session::{ResetPeriod, SessionResetPolicy};
pub use weighting::{WeightingKind, WeightingScheme};
