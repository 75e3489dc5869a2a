/// indicators/vwap.rs: Session VWAP / TWAP and anchored VWAP
///
/// `VwapIndicator` couples a `SessionResetPolicy` with `RunningMomentStats`;
/// the same type yields a TWAP when built with `MomentWeight::Equal`.
///
/// `AnchoredVwap` accumulates from an anchor bar onward.  Moving the anchor
/// or changing the price source restarts the accumulation from the retained
/// bars.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Bar, PriceSource};
use crate::models::{Band, MomentWeight, ResetPeriod, RunningMomentStats, SessionResetPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapOutput {
    pub value: f64,
    pub std_dev: f64,
    pub bands: Vec<Band>,
    /// This bar started a fresh accumulation
    pub reset: bool,
}

impl VwapOutput {
    fn from_stats(stats: &RunningMomentStats, multipliers: &[f64], reset: bool) -> Self {
        Self {
            value: stats.mean(),
            std_dev: stats.std_dev(),
            bands: stats.bands(multipliers),
            reset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VwapIndicator {
    source: PriceSource,
    policy: SessionResetPolicy,
    stats: RunningMomentStats,
    multipliers: Vec<f64>,
}

impl VwapIndicator {
    pub fn new(weight: MomentWeight, source: PriceSource, reset: ResetPeriod, multipliers: Vec<f64>) -> Self {
        Self {
            source,
            policy: SessionResetPolicy::new(reset),
            stats: RunningMomentStats::new(weight),
            multipliers,
        }
    }

    pub fn on_bar(&mut self, bar: &Bar) -> VwapOutput {
        let boundary = self.policy.should_reset(bar);
        let reset = boundary || self.stats.is_empty();
        self.stats.update(self.source.price(bar), bar.volume, reset);
        VwapOutput::from_stats(&self.stats, &self.multipliers, reset)
    }

    pub fn stats(&self) -> &RunningMomentStats {
        &self.stats
    }
}

#[derive(Debug, Clone)]
pub struct AnchoredVwap {
    anchor: Option<usize>,
    source: PriceSource,
    stats: RunningMomentStats,
    multipliers: Vec<f64>,
    /// Every bar seen, for restarts after the anchor moves
    bars: Vec<Bar>,
}

impl AnchoredVwap {
    pub fn new(anchor: Option<usize>, source: PriceSource, multipliers: Vec<f64>) -> Self {
        Self {
            anchor,
            source,
            stats: RunningMomentStats::new(MomentWeight::Volume),
            multipliers,
            bars: Vec::new(),
        }
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn source(&self) -> PriceSource {
        self.source
    }

    /// Move the anchor.  With `anchor_price` the price source is inferred
    /// from where the anchor sits on its bar.
    pub fn set_anchor(&mut self, index: usize, anchor_price: Option<f64>, tick_size: f64) {
        let mut source = self.source;
        if let Some(price) = anchor_price {
            if let Some(bar) = self.bars.iter().find(|b| b.index == index) {
                source = PriceSource::detect(price, bar, tick_size);
            }
        }
        if self.anchor != Some(index) || source != self.source {
            self.anchor = Some(index);
            self.source = source;
            self.recalculate();
        }
    }

    pub fn set_price_source(&mut self, source: PriceSource) {
        if source != self.source {
            self.source = source;
            self.recalculate();
        }
    }

    fn recalculate(&mut self) {
        self.stats.clear();
        let Some(anchor) = self.anchor else {
            return;
        };
        for bar in self.bars.iter().filter(|b| b.index >= anchor) {
            let reset = self.stats.is_empty();
            self.stats.update(self.source.price(bar), bar.volume, reset);
        }
        debug!(anchor, source = %self.source, "anchored vwap recalculated");
    }

    /// Fold a closed bar; `None` before the anchor (or with no anchor).
    pub fn on_bar(&mut self, bar: &Bar) -> Option<VwapOutput> {
        self.bars.push(*bar);
        let anchor = self.anchor?;
        if bar.index < anchor {
            return None;
        }
        let reset = self.stats.is_empty();
        self.stats.update(self.source.price(bar), bar.volume, reset);
        Some(VwapOutput::from_stats(&self.stats, &self.multipliers, reset))
    }

    /// Current value, if the anchor has been reached.
    pub fn value(&self) -> Option<VwapOutput> {
        if self.stats.is_empty() {
            return None;
        }
        Some(VwapOutput::from_stats(&self.stats, &self.multipliers, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn session_vwap_resets_on_first_bar() {
        let mut v = VwapIndicator::new(MomentWeight::Volume, PriceSource::Close, ResetPeriod::Session, vec![1.0, 2.0]);
        v.on_bar(&bar(0, at(4, 9, 30), [10.0, 10.0, 10.0, 10.0], 1.0, true));
        let o = v.on_bar(&bar(1, at(4, 9, 31), [20.0, 20.0, 20.0, 20.0], 3.0, false));
        assert!((o.value - 17.5).abs() < 1e-9, "vwap = {}", o.value);
        assert_eq!(o.bands.len(), 2);
        assert!(o.bands[1].upper > o.bands[0].upper);

        let o = v.on_bar(&bar(2, at(5, 9, 30), [30.0, 30.0, 30.0, 30.0], 2.0, true));
        assert!(o.reset);
        assert!((o.value - 30.0).abs() < 1e-9);
        assert_eq!(o.std_dev, 0.0);
    }

    #[test]
    fn twap_weights_bars_equally() {
        let mut v = VwapIndicator::new(MomentWeight::Equal, PriceSource::Close, ResetPeriod::Session, vec![1.0]);
        v.on_bar(&bar(0, at(4, 9, 30), [10.0; 4], 100.0, true));
        let o = v.on_bar(&bar(1, at(4, 9, 31), [20.0; 4], 1.0, false));
        assert!((o.value - 15.0).abs() < 1e-9);
        assert!((o.bands[0].upper - 20.0).abs() < 1e-9);
    }

    #[test]
    fn hlc3_source() {
        let mut v = VwapIndicator::new(MomentWeight::Volume, PriceSource::Hlc3, ResetPeriod::NoReset, vec![]);
        let o = v.on_bar(&bar(0, at(4, 9, 30), [10.0, 12.0, 6.0, 9.0], 5.0, true));
        assert!((o.value - 9.0).abs() < 1e-9);
        assert!(o.bands.is_empty());
    }

    #[test]
    fn anchored_ignores_bars_before_anchor() {
        let mut a = AnchoredVwap::new(Some(2), PriceSource::Close, vec![1.0]);
        for i in 0..4 {
            let px = 10.0 * (i + 1) as f64;
            let out = a.on_bar(&bar(i, at(4, 9, 30 + i as u32), [px; 4], 1.0, i == 0));
            assert_eq!(out.is_some(), i >= 2);
        }
        let v = a.value().unwrap();
        assert!((v.value - 35.0).abs() < 1e-9, "avwap = {}", v.value);
    }

    #[test]
    fn moving_anchor_restarts() {
        let mut a = AnchoredVwap::new(None, PriceSource::Close, vec![1.0]);
        for i in 0..4 {
            let px = 10.0 * (i + 1) as f64;
            assert!(a.on_bar(&bar(i, at(4, 9, 30 + i as u32), [px; 4], 1.0, i == 0)).is_none());
        }
        a.set_anchor(1, None, 0.25);
        assert!((a.value().unwrap().value - 30.0).abs() < 1e-9);

        a.set_anchor(3, None, 0.25);
        assert!((a.value().unwrap().value - 40.0).abs() < 1e-9);
    }

    #[test]
    fn anchor_price_selects_source() {
        let mut a = AnchoredVwap::new(None, PriceSource::Close, vec![]);
        a.on_bar(&bar(0, at(4, 9, 30), [10.0, 14.0, 8.0, 12.0], 1.0, true));
        a.set_anchor(0, Some(14.0), 0.25);
        assert_eq!(a.source(), PriceSource::Hl2);
        assert!((a.value().unwrap().value - 11.0).abs() < 1e-9);

        a.set_price_source(PriceSource::Close);
        assert!((a.value().unwrap().value - 12.0).abs() < 1e-9);
    }
}
