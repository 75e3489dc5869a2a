/// indicators/divergence.rs: Price slope vs COFI disagreement
///
/// Keeps trailing closes and COFI values.  Once `max(regression, correlation)`
/// bars exist, each bar yields:
///   slope   least-squares slope of the last `regression` closes
///   ρ       Pearson correlation of the last `correlation` closes and COFIs
///   raw     divergence_signal(slope, cofi)
///   signal  EMA(raw) once the EMA is warm (when smoothing is on), else raw
///   regime  correlation regime of ρ
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::regression::{
    divergence_signal, linear_regression_slope, pearson_correlation, CorrelationRegime,
    CorrelationThresholds,
};
use crate::models::{MaType, MovingAverage};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceOutput {
    pub price_slope: f64,
    pub cofi: f64,
    pub raw: f64,
    pub signal: f64,
    pub correlation: f64,
    pub regime: CorrelationRegime,
}

#[derive(Debug, Clone)]
pub struct DivergenceIndicator {
    regression_period: usize,
    correlation_period: usize,
    thresholds: CorrelationThresholds,
    smoother: Option<MovingAverage>,
    closes: VecDeque<f64>,
    cofis: VecDeque<f64>,
}

impl DivergenceIndicator {
    /// `smoothing` of 0 disables the EMA.
    pub fn new(
        regression_period: usize,
        correlation_period: usize,
        smoothing: usize,
        thresholds: CorrelationThresholds,
    ) -> Self {
        let cap = regression_period.max(correlation_period);
        Self {
            regression_period,
            correlation_period,
            thresholds,
            smoother: (smoothing > 0).then(|| MovingAverage::new(MaType::Ema, smoothing)),
            closes: VecDeque::with_capacity(cap + 1),
            cofis: VecDeque::with_capacity(cap + 1),
        }
    }

    fn required(&self) -> usize {
        self.regression_period.max(self.correlation_period).max(2)
    }

    pub fn update(&mut self, close: f64, cofi: f64) -> Option<DivergenceOutput> {
        let required = self.required();
        self.closes.push_back(close);
        self.cofis.push_back(cofi);
        while self.closes.len() > required {
            self.closes.pop_front();
            self.cofis.pop_front();
        }
        if self.closes.len() < required {
            return None;
        }

        let closes = self.closes.make_contiguous();
        let price_slope = linear_regression_slope(closes, self.regression_period);
        let skip = closes.len() - self.correlation_period.min(closes.len());
        let price_window = closes[skip..].to_vec();
        let cofi_window = &self.cofis.make_contiguous()[skip..];

        let correlation = match pearson_correlation(&price_window, cofi_window) {
            Ok(rho) => rho,
            Err(e) => {
                warn!(error = %e, "correlation skipped");
                0.0
            }
        };

        let raw = divergence_signal(price_slope, cofi);
        let signal = match self.smoother.as_mut() {
            Some(ma) => ma.push(raw).unwrap_or(raw),
            None => raw,
        };

        Some(DivergenceOutput {
            price_slope,
            cofi,
            raw,
            signal,
            correlation,
            regime: self.thresholds.classify(correlation),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withheld_until_windows_fill() {
        let mut d = DivergenceIndicator::new(3, 4, 0, CorrelationThresholds::default());
        for i in 0..3 {
            assert!(d.update(100.0 + i as f64, 1.0).is_none());
        }
        assert!(d.update(103.0, 1.0).is_some());
    }

    #[test]
    fn rising_price_falling_flow_is_bearish() {
        let mut d = DivergenceIndicator::new(4, 4, 0, CorrelationThresholds::default());
        let mut out = None;
        for i in 0..4 {
            out = d.update(100.0 + i as f64, -(i as f64) - 1.0);
        }
        let out = out.unwrap();
        assert!((out.price_slope - 1.0).abs() < 1e-9);
        // -sqrt(|1 · -4|)
        assert!((out.raw + 2.0).abs() < 1e-9, "raw = {}", out.raw);
        assert_eq!(out.signal, out.raw);
        assert!((out.correlation + 1.0).abs() < 1e-9);
        assert_eq!(out.regime, CorrelationRegime::Inverse);
    }

    #[test]
    fn aligned_moves_have_no_signal() {
        let mut d = DivergenceIndicator::new(3, 3, 0, CorrelationThresholds::default());
        let mut out = None;
        for i in 0..5 {
            out = d.update(100.0 + i as f64, i as f64 + 1.0);
        }
        let out = out.unwrap();
        assert_eq!(out.raw, 0.0);
        assert_eq!(out.regime, CorrelationRegime::Aligned);
    }

    #[test]
    fn smoothing_replaces_raw_once_warm() {
        let mut d = DivergenceIndicator::new(2, 2, 2, CorrelationThresholds::default());
        d.update(100.0, -1.0);
        // First emission: EMA still warming, raw passes through
        let a = d.update(101.0, -1.0).unwrap();
        assert_eq!(a.signal, a.raw);
        // Second emission: EMA(2) of [-1, raw_b]
        let b = d.update(102.0, -4.0).unwrap();
        assert!((b.raw + 2.0).abs() < 1e-9);
        let expected = (2.0 / 3.0) * b.raw + (1.0 / 3.0) * a.raw;
        assert!((b.signal - expected).abs() < 1e-9, "signal = {}", b.signal);
    }
}
