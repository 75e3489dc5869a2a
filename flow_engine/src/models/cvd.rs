/// models/cvd.rs: Per-bar aggression delta and cumulative volume delta
///
///   Trades are split with the bid/ask threshold rule (inside the spread
///   → half to each side).
///
///   delta_t = buys_t − sells_t
///   open_t  = close_{t−1}        (0 on a reset bar)
///   close_t = open_t + delta_t
///   high_t  = max(open_t, close_t),  low_t = min(open_t, close_t)
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::classify_bid_ask;
use super::session::{ResetPeriod, SessionResetPolicy};
use crate::data::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvdBar {
    /// Aggression delta of this bar alone
    pub delta: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub reset: bool,
}

#[derive(Debug, Clone)]
pub struct CumulativeDelta {
    policy: SessionResetPolicy,
    buys: f64,
    sells: f64,
    cumulative: f64,
}

impl CumulativeDelta {
    pub fn new(reset: ResetPeriod) -> Self {
        Self {
            policy: SessionResetPolicy::new(reset),
            buys: 0.0,
            sells: 0.0,
            cumulative: 0.0,
        }
    }

    pub fn add_trade(&mut self, price: f64, bid: f64, ask: f64, volume: f64) {
        if volume <= 0.0 {
            return;
        }
        let (b, s) = classify_bid_ask(price, bid, ask).attribute(volume);
        self.buys += b;
        self.sells += s;
    }

    /// Delta of the bar being built.
    pub fn pending_delta(&self) -> f64 {
        self.buys - self.sells
    }

    pub fn close_bar(&mut self, bar: &Bar) -> CvdBar {
        let reset = self.policy.should_reset(bar);
        if reset {
            debug!(bar = bar.index, period = %self.policy.period(), "cvd reset");
            self.cumulative = 0.0;
        }
        let open = self.cumulative;
        let delta = self.pending_delta();
        self.cumulative += delta;
        self.buys = 0.0;
        self.sells = 0.0;

        CvdBar {
            delta,
            open,
            high: open.max(self.cumulative),
            low: open.min(self.cumulative),
            close: self.cumulative,
            reset,
        }
    }

    pub fn value(&self) -> f64 {
        self.cumulative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;

    #[test]
    fn candle_chains_from_previous_close() {
        let mut c = CumulativeDelta::new(ResetPeriod::NoReset);
        c.add_trade(101.0, 100.0, 101.0, 5.0);
        let a = c.close_bar(&bar(0, at(4, 9, 30), [100.0; 4], 5.0, true));
        assert_eq!((a.open, a.close, a.delta), (0.0, 5.0, 5.0));

        c.add_trade(100.0, 100.0, 101.0, 8.0);
        c.add_trade(100.5, 100.0, 101.0, 2.0);
        let b = c.close_bar(&bar(1, at(4, 9, 31), [100.0; 4], 10.0, false));
        assert_eq!(b.delta, -8.0);
        assert_eq!((b.open, b.close), (5.0, -3.0));
        assert_eq!((b.high, b.low), (5.0, -3.0));
    }

    #[test]
    fn session_reset_keeps_own_delta() {
        let mut c = CumulativeDelta::new(ResetPeriod::Session);
        c.add_trade(101.0, 100.0, 101.0, 5.0);
        c.close_bar(&bar(0, at(4, 9, 30), [100.0; 4], 5.0, true));
        c.add_trade(101.0, 100.0, 101.0, 2.0);
        c.close_bar(&bar(1, at(4, 9, 31), [100.0; 4], 2.0, false));
        assert_eq!(c.value(), 7.0);

        c.add_trade(100.0, 100.0, 101.0, 3.0);
        let r = c.close_bar(&bar(2, at(5, 9, 30), [100.0; 4], 3.0, true));
        assert!(r.reset);
        assert_eq!((r.open, r.close), (0.0, -3.0));
    }

    #[test]
    fn daily_reset() {
        let mut c = CumulativeDelta::new(ResetPeriod::Daily);
        c.add_trade(101.0, 100.0, 101.0, 1.0);
        c.close_bar(&bar(0, at(4, 23, 0), [100.0; 4], 1.0, false));
        c.add_trade(101.0, 100.0, 101.0, 1.0);
        let r = c.close_bar(&bar(1, at(5, 0, 0), [100.0; 4], 1.0, false));
        assert!(r.reset);
        assert_eq!(r.close, 1.0);
    }
}
