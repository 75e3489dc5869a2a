/// indicators/cofi.rs: Cumulative / weighted OFI with two moving averages
///
///   cofi_t = Σ_d w(d) · OFI_{t−d} · V_{t−d}     (see models::weighting)
///   ma1_t  = MA1(cofi),  ma2_t = MA2(cofi)
///   diff_t = ma1_t − ma2_t                     (only when both are warm)
use serde::{Deserialize, Serialize};

use crate::data::Tick;
use crate::models::{
    ClassificationMethod, MaType, MovingAverage, OrderFlowAccumulator, OrderFlowBar,
    TradeClassifier, WeightingScheme,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CofiOutput {
    pub bar: OrderFlowBar,
    pub cofi: f64,
    pub ma1: Option<f64>,
    pub ma2: Option<f64>,
    pub diff: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CofiIndicator {
    classifier: TradeClassifier,
    accumulator: OrderFlowAccumulator,
    scheme: WeightingScheme,
    ma1: MovingAverage,
    ma2: MovingAverage,
}

impl CofiIndicator {
    /// `history_len` bounds the retained bars (0 = unbounded).
    pub fn new(
        method: ClassificationMethod,
        scheme: WeightingScheme,
        history_len: usize,
        ma1: (MaType, usize),
        ma2: (MaType, usize),
    ) -> Self {
        Self {
            classifier: TradeClassifier::new(method),
            accumulator: OrderFlowAccumulator::new(history_len),
            scheme,
            ma1: MovingAverage::new(ma1.0, ma1.1),
            ma2: MovingAverage::new(ma2.0, ma2.1),
        }
    }

    pub fn on_tick(&mut self, tick: &Tick) {
        let side = self.classifier.classify(tick.price, tick.bid, tick.ask);
        self.accumulator.add_tick(tick.volume, side);
    }

    pub fn close_bar(&mut self, bar_index: usize) -> CofiOutput {
        let bar = self.accumulator.close_bar(bar_index);
        let cofi = self.accumulator.weighted_value(&self.scheme);
        let ma1 = self.ma1.push(cofi);
        let ma2 = self.ma2.push(cofi);
        let diff = match (ma1, ma2) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        CofiOutput { bar, cofi, ma1, ma2, diff }
    }

    pub fn scheme(&self) -> &WeightingScheme {
        &self.scheme
    }

    pub fn accumulator(&self) -> &OrderFlowAccumulator {
        &self.accumulator
    }
}
