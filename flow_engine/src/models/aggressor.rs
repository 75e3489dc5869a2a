/// models/aggressor.rs: Share of volume that crossed the spread
///
///   spread s = ask − bid  (trades with s ≤ 0 are ignored)
///   price ≥ ask − 0.1·s  → aggressive buy
///   price ≤ bid + 0.1·s  → aggressive sell
///   otherwise            → passive, buy side above the mid, sell side below
///
///   ratio = aggressive / (aggressive + passive)   (0.5 with no volume)
///
/// Counters run from the last reset (session start when enabled).  Ratios
/// are withheld for the first `lookback` bars; the smoothed ratio is the
/// mean of the last `smoothing` ratios that are above zero, withheld until
/// that many ratios exist.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// Fraction of the spread counted as "at the touch".
const TOUCH_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggressorCounts {
    pub aggressive_buy: f64,
    pub aggressive_sell: f64,
    pub passive_buy: f64,
    pub passive_sell: f64,
}

impl AggressorCounts {
    pub fn aggressive(&self) -> f64 {
        self.aggressive_buy + self.aggressive_sell
    }

    pub fn passive(&self) -> f64 {
        self.passive_buy + self.passive_sell
    }

    /// aggressive / total, 0.5 when empty.
    pub fn ratio(&self) -> f64 {
        let total = self.aggressive() + self.passive();
        if total <= 0.0 {
            return 0.5;
        }
        (self.aggressive() / total).clamp(0.0, 1.0)
    }

    fn merge(&mut self, other: &AggressorCounts) {
        self.aggressive_buy += other.aggressive_buy;
        self.aggressive_sell += other.aggressive_sell;
        self.passive_buy += other.passive_buy;
        self.passive_sell += other.passive_sell;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggressorOutput {
    pub ratio: Option<f64>,
    pub smoothed: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AggressorRatio {
    lookback: usize,
    smoothing: usize,
    reset_on_session: bool,
    /// Trades of the bar being built
    pending: AggressorCounts,
    cumulative: AggressorCounts,
    recent: VecDeque<f64>,
    bars: usize,
}

impl AggressorRatio {
    pub fn new(lookback: usize, smoothing: usize, reset_on_session: bool) -> Self {
        let smoothing = smoothing.max(1);
        Self {
            lookback,
            smoothing,
            reset_on_session,
            pending: AggressorCounts::default(),
            cumulative: AggressorCounts::default(),
            recent: VecDeque::with_capacity(smoothing),
            bars: 0,
        }
    }

    pub fn add_trade(&mut self, price: f64, bid: f64, ask: f64, volume: f64) {
        let spread = ask - bid;
        if spread <= 0.0 || volume <= 0.0 {
            return;
        }
        let p = &mut self.pending;
        if price >= ask - spread * TOUCH_FRACTION {
            p.aggressive_buy += volume;
        } else if price <= bid + spread * TOUCH_FRACTION {
            p.aggressive_sell += volume;
        } else if price > (bid + ask) / 2.0 {
            p.passive_buy += volume;
        } else {
            p.passive_sell += volume;
        }
    }

    /// Close a bar: apply a session reset, fold in the bar's trades and
    /// emit the ratio once past the lookback.
    pub fn close_bar(&mut self, bar: &Bar) -> AggressorOutput {
        if self.reset_on_session && bar.is_first_of_session {
            self.cumulative = AggressorCounts::default();
        }
        let pending = std::mem::take(&mut self.pending);
        self.cumulative.merge(&pending);

        let bar_number = self.bars;
        self.bars += 1;
        if bar_number < self.lookback {
            return AggressorOutput::default();
        }

        let ratio = self.cumulative.ratio();
        self.recent.push_back(ratio);
        if self.recent.len() > self.smoothing {
            self.recent.pop_front();
        }

        if self.recent.len() < self.smoothing {
            return AggressorOutput { ratio: Some(ratio), smoothed: None };
        }
        let positive: Vec<f64> = self.recent.iter().copied().filter(|&r| r > 0.0).collect();
        let smoothed = if positive.is_empty() {
            0.5
        } else {
            positive.iter().sum::<f64>() / positive.len() as f64
        };

        AggressorOutput { ratio: Some(ratio), smoothed: Some(smoothed) }
    }

    pub fn counts(&self) -> &AggressorCounts {
        &self.cumulative
    }
}
