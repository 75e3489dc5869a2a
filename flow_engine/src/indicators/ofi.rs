/// indicators/ofi.rs: Bar OFI histogram with smoothing and strength bands
///
///   ofi_t   = bar imbalance from the accumulator
///   ma_t    = MA(ofi)                (withheld while warming up)
///   strength:
///     ofi ≥  strong   → StrongBuy      ofi ≤ −strong   → StrongSell
///     ofi ≥  level    → Buy            ofi ≤ −level    → Sell
///     otherwise       → Neutral
use serde::{Deserialize, Serialize};

use crate::data::Tick;
use crate::models::{
    ClassificationMethod, MaType, MovingAverage, OrderFlowAccumulator, OrderFlowBar,
    TradeClassifier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfiStrength {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl OfiStrength {
    pub fn classify(ofi: f64, level: f64, strong: f64) -> Self {
        if ofi >= strong {
            OfiStrength::StrongBuy
        } else if ofi >= level {
            OfiStrength::Buy
        } else if ofi <= -strong {
            OfiStrength::StrongSell
        } else if ofi <= -level {
            OfiStrength::Sell
        } else {
            OfiStrength::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfiOutput {
    pub bar: OrderFlowBar,
    pub ma: Option<f64>,
    pub strength: OfiStrength,
}

#[derive(Debug, Clone)]
pub struct OfiHistogram {
    classifier: TradeClassifier,
    /// Only the latest bar matters here
    accumulator: OrderFlowAccumulator,
    ma: MovingAverage,
    level: f64,
    strong: f64,
}

impl OfiHistogram {
    pub fn new(method: ClassificationMethod, ma_type: MaType, ma_length: usize, level: f64, strong: f64) -> Self {
        Self {
            classifier: TradeClassifier::new(method),
            accumulator: OrderFlowAccumulator::new(1),
            ma: MovingAverage::new(ma_type, ma_length),
            level,
            strong,
        }
    }

    pub fn on_tick(&mut self, tick: &Tick) {
        let side = self.classifier.classify(tick.price, tick.bid, tick.ask);
        self.accumulator.add_tick(tick.volume, side);
    }

    pub fn close_bar(&mut self, bar_index: usize) -> OfiOutput {
        let bar = self.accumulator.close_bar(bar_index);
        let ma = self.ma.push(bar.ofi);
        OfiOutput {
            bar,
            ma,
            strength: OfiStrength::classify(bar.ofi, self.level, self.strong),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn strength_bands() {
        assert_eq!(OfiStrength::classify(0.7, 0.3, 0.6), OfiStrength::StrongBuy);
        assert_eq!(OfiStrength::classify(0.3, 0.3, 0.6), OfiStrength::Buy);
        assert_eq!(OfiStrength::classify(0.1, 0.3, 0.6), OfiStrength::Neutral);
        assert_eq!(OfiStrength::classify(-0.4, 0.3, 0.6), OfiStrength::Sell);
        assert_eq!(OfiStrength::classify(-1.0, 0.3, 0.6), OfiStrength::StrongSell);
    }

    #[test]
    fn bid_ask_histogram_splits_inside_spread() {
        let mut h = OfiHistogram::new(ClassificationMethod::BidAsk, MaType::Sma, 2, 0.3, 0.6);
        let t = at(4, 9, 30);
        h.on_tick(&tick(101.0, 100.0, 102.0, 10.0, t));
        h.on_tick(&tick(99.0, 98.0, 100.0, 10.0, t));
        let out = h.close_bar(0);
        assert_eq!(out.bar.buy_volume, 10.0);
        assert_eq!(out.bar.sell_volume, 10.0);
        assert_eq!(out.bar.ofi, 0.0);
        assert_eq!(out.ma, None);
        assert_eq!(out.strength, OfiStrength::Neutral);

        h.on_tick(&tick(102.0, 100.0, 102.0, 4.0, t));
        let out = h.close_bar(1);
        assert_eq!(out.bar.ofi, 1.0);
        assert_eq!(out.ma, Some(0.5));
        assert_eq!(out.strength, OfiStrength::StrongBuy);
    }

    #[test]
    fn lee_ready_histogram_uses_tick_rule_at_mid() {
        let mut h = OfiHistogram::new(ClassificationMethod::LeeReady, MaType::None, 1, 0.3, 0.6);
        let t = at(4, 9, 30);
        // First print at the mid has no previous trade: split
        h.on_tick(&tick(101.0, 100.0, 102.0, 10.0, t));
        // At the new mid, down-tick from 101: sell
        h.on_tick(&tick(99.0, 98.0, 100.0, 10.0, t));
        let out = h.close_bar(0);
        assert_eq!((out.bar.buy_volume, out.bar.sell_volume), (5.0, 15.0));
        assert!((out.bar.ofi + 0.5).abs() < 1e-12, "ofi = {}", out.bar.ofi);
    }
}
