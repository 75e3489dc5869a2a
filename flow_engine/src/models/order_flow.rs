/// models/order_flow.rs: Per-bar order flow imbalance and its history
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Within a bar, each classified trade adds to
///     B = Σ buy volume,   S = Σ sell volume   (Split adds V/2 to each)
///
///   Bar imbalance:
///     OFI = (B − S) / (B + S)    ∈ [−1, +1]
///     OFI = 0                    when B + S = 0
///
///   The completed bars form a history (oldest first).  With a bounded
///   history of length L the oldest bar is evicted once the count exceeds L.
///   Every closed bar is appended, including zero-volume bars, so the
///   history length always equals bars closed since the last reset (capped).
///
///   Weighted aggregate (age d = 0 for the most recent bar):
///     W = Σ_d w(d) · OFI_d · V_d
/// ─────────────────────────────────────────────────────────────────────────

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::classifier::TradeSide;
use super::weighting::WeightingScheme;

/// (buy − sell) / (buy + sell), or 0 with no volume.
pub fn calculate_ofi(buy_volume: f64, sell_volume: f64) -> f64 {
    let total = buy_volume + sell_volume;
    if total <= 0.0 {
        return 0.0;
    }
    ((buy_volume - sell_volume) / total).clamp(-1.0, 1.0)
}

/// One completed bar of order flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowBar {
    pub ofi: f64,
    pub volume: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub bar_index: usize,
}

/// Buy/sell accumulation for the open bar plus the bounded history of
/// closed bars.
#[derive(Debug, Clone)]
pub struct OrderFlowAccumulator {
    /// Maximum retained bars (0 = unbounded)
    max_len: usize,
    buy_volume: f64,
    sell_volume: f64,
    history: VecDeque<OrderFlowBar>,
}

impl OrderFlowAccumulator {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            buy_volume: 0.0,
            sell_volume: 0.0,
            history: VecDeque::with_capacity(max_len.min(1024)),
        }
    }

    /// Attribute a classified trade to the open bar.
    pub fn add_tick(&mut self, volume: f64, side: TradeSide) {
        if volume <= 0.0 || !volume.is_finite() {
            return;
        }
        let (buy, sell) = side.attribute(volume);
        self.buy_volume += buy;
        self.sell_volume += sell;
    }

    /// Close the open bar: compute its OFI, append it to history and clear
    /// the per-bar counters.
    pub fn close_bar(&mut self, bar_index: usize) -> OrderFlowBar {
        let bar = OrderFlowBar {
            ofi: calculate_ofi(self.buy_volume, self.sell_volume),
            volume: self.buy_volume + self.sell_volume,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            bar_index,
        };

        self.history.push_back(bar);
        if self.max_len > 0 {
            while self.history.len() > self.max_len {
                self.history.pop_front();
            }
        }

        self.buy_volume = 0.0;
        self.sell_volume = 0.0;
        bar
    }

    /// Σ w(age) · ofi · volume over the retained history.
    pub fn weighted_value(&self, scheme: &WeightingScheme) -> f64 {
        let horizon = scheme.horizon();
        let mut sum = 0.0;
        for (age, bar) in self.history.iter().rev().enumerate() {
            if horizon.is_some_and(|h| age > h) {
                break;
            }
            sum += scheme.weight(age) * bar.ofi * bar.volume;
        }
        sum
    }

    /// Imbalance of the bar still being built.
    pub fn pending_ofi(&self) -> f64 {
        calculate_ofi(self.buy_volume, self.sell_volume)
    }

    pub fn history(&self) -> &VecDeque<OrderFlowBar> {
        &self.history
    }

    pub fn last(&self) -> Option<&OrderFlowBar> {
        self.history.back()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop the history and the open bar's counters.
    pub fn reset(&mut self) {
        self.history.clear();
        self.buy_volume = 0.0;
        self.sell_volume = 0.0;
    }
}
