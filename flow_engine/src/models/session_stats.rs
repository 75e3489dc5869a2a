/// models/session_stats.rs: Empirical distribution of session returns
///
///   r_s = (close_last − open_first) / open_first   for each completed session
///
///   Once more than MIN_SESSIONS returns are stored, every bar after the
///   first of a session gets price zones around the session open O:
///     50 % zone  [O·(1 + q₂₅), O·(1 + q₇₅)]
///     90 % zone  [O·(1 + q₁₀), O·(1 + q₉₀)]
///   with empirical quantiles qₚ over the bounded return history:
///     h = (n − 1)·p,   qₚ = x₍⌊h⌋₎ + (h − ⌊h⌋)·(x₍⌈h⌉₎ − x₍⌊h⌋₎)
///   over the sorted returns x₍₀₎ ≤ … ≤ x₍ₙ₋₁₎.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

use crate::data::Bar;

/// Sessions required before zones are produced (strictly more than this).
pub const MIN_SESSIONS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityZones {
    pub session_open: f64,
    pub low_50: f64,
    pub high_50: f64,
    pub low_90: f64,
    pub high_90: f64,
}

#[derive(Debug, Clone)]
pub struct SessionReturnDistribution {
    lookback: usize,
    returns: VecDeque<f64>,
    session_open: Option<f64>,
    /// A session open is waiting for its close
    open_pending: bool,
}

impl SessionReturnDistribution {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
            returns: VecDeque::with_capacity(lookback.min(4096)),
            session_open: None,
            open_pending: false,
        }
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<ProbabilityZones> {
        if bar.is_first_of_session {
            self.session_open = Some(bar.open);
            self.open_pending = true;
        }

        if bar.is_last_of_session && self.open_pending {
            if let Some(open) = self.session_open.filter(|o| *o > 0.0) {
                self.returns.push_back((bar.close - open) / open);
                if self.returns.len() > self.lookback {
                    self.returns.pop_front();
                }
            }
            self.open_pending = false;
        }

        if self.returns.len() > MIN_SESSIONS && !bar.is_first_of_session {
            self.zones()
        } else {
            None
        }
    }

    fn zones(&self) -> Option<ProbabilityZones> {
        let open = self.session_open?;
        let mut data = Data::new(self.returns.iter().copied().collect::<Vec<f64>>());
        let q10 = interpolated_quantile(&mut data, 0.10)?;
        let q25 = interpolated_quantile(&mut data, 0.25)?;
        let q75 = interpolated_quantile(&mut data, 0.75)?;
        let q90 = interpolated_quantile(&mut data, 0.90)?;
        Some(ProbabilityZones {
            session_open: open,
            low_50: open * (1.0 + q25),
            high_50: open * (1.0 + q75),
            low_90: open * (1.0 + q10),
            high_90: open * (1.0 + q90),
        })
    }

    pub fn returns(&self) -> &VecDeque<f64> {
        &self.returns
    }
}

/// Linear interpolation between the order statistics around (n − 1)·p.
pub fn interpolated_quantile(data: &mut Data<Vec<f64>>, p: f64) -> Option<f64> {
    let n = data.len();
    if n == 0 {
        return None;
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    // order_statistic is 1-based
    let x_lo = data.order_statistic(lo + 1);
    let x_hi = data.order_statistic(hi + 1);
    Some(x_lo + (h - lo as f64) * (x_hi - x_lo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;
    use chrono::Duration;

    /// One two-bar session per day, open 100, closing at 100 + move.
    fn feed_session(d: &mut SessionReturnDistribution, n: usize, close: f64) -> Option<ProbabilityZones> {
        let start = at(1, 9, 30) + Duration::days(n as i64);
        d.on_bar(&bar(2 * n, start, [100.0, 101.0, 99.0, 100.0], 1.0, true));
        let mut last = bar(2 * n + 1, start + Duration::hours(6), [100.0, 101.0, 99.0, close], 1.0, false);
        last.is_last_of_session = true;
        d.on_bar(&last)
    }

    #[test]
    fn no_zones_until_enough_sessions() {
        let mut d = SessionReturnDistribution::new(250);
        for n in 0..30 {
            assert!(feed_session(&mut d, n, 100.0 + (n % 5) as f64).is_none());
        }
        assert_eq!(d.returns().len(), 30);
        // The 31st close pushes the count past the minimum
        assert!(feed_session(&mut d, 30, 101.0).is_some());
    }

    #[test]
    fn zones_are_ordered() {
        let mut d = SessionReturnDistribution::new(250);
        let mut z = None;
        for n in 0..40 {
            z = feed_session(&mut d, n, 95.0 + (n % 11) as f64);
        }
        let z = z.unwrap();
        assert_eq!(z.session_open, 100.0);
        assert!(z.low_90 <= z.low_50);
        assert!(z.low_50 <= z.high_50);
        assert!(z.high_50 <= z.high_90);
        assert!(z.low_90 >= 95.0 - 1e-9 && z.high_90 <= 105.0 + 1e-9);
    }

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let mut data = Data::new(vec![4.0, 1.0, 3.0, 2.0]);
        // h = 3 · 0.5 = 1.5, halfway between 2 and 3
        assert!((interpolated_quantile(&mut data, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(interpolated_quantile(&mut data, 0.0), Some(1.0));
        assert_eq!(interpolated_quantile(&mut data, 1.0), Some(4.0));
        assert!(interpolated_quantile(&mut Data::new(Vec::new()), 0.5).is_none());
    }

    #[test]
    fn zones_pin_interpolated_quantiles() {
        let mut d = SessionReturnDistribution::new(250);
        let mut z = None;
        // Returns n² · 0.0001 for n = 0..=30
        for n in 0..31 {
            z = feed_session(&mut d, n, 100.0 + (n * n) as f64 * 0.01);
        }
        let z = z.unwrap();
        // q10: h = 3 → 9e-4
        assert!((z.low_90 - 100.09).abs() < 1e-9, "low_90 = {}", z.low_90);
        // q75: h = 22.5 → (484 + 529) / 2 · 1e-4
        assert!((z.high_50 - 105.065).abs() < 1e-9, "high_50 = {}", z.high_50);
        // q90: h = 27 → 729e-4
        assert!((z.high_90 - 107.29).abs() < 1e-9, "high_90 = {}", z.high_90);
    }

    #[test]
    fn history_is_bounded() {
        let mut d = SessionReturnDistribution::new(5);
        for n in 0..12 {
            feed_session(&mut d, n, 100.0 + n as f64);
        }
        assert_eq!(d.returns().len(), 5);
        assert!((d.returns()[0] - 0.07).abs() < 1e-12);
    }
}
