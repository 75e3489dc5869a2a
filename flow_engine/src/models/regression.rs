/// models/regression.rs: Slope, correlation and the price/flow divergence
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// LEAST-SQUARES SLOPE over the last n values y_0 … y_{n−1} (oldest first,
/// x = 0 … n−1):
///     β = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)
///   β > 0 means the series has been rising.  β = 0 when n < 2, fewer than n
///   values exist or the denominator is below 1e-4.
///
/// PEARSON CORRELATION
///     ρ = (n·Σxy − Σx·Σy) / √((n·Σx² − (Σx)²)(n·Σy² − (Σy)²))
///   clamped to [−1, 1]; 0 for empty input or a denominator below 1e-10.
///
/// DIVERGENCE between price slope β and flow value f:
///     β > 0, f < 0  →  −√|β·f|    (bearish)
///     β < 0, f > 0  →  +√|β·f|    (bullish)
///     otherwise     →  0
/// ─────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Slope of the trailing `period` values of `values` (oldest first).
pub fn linear_regression_slope(values: &[f64], period: usize) -> f64 {
    if period < 2 || values.len() < period {
        return 0.0;
    }
    let window = &values[values.len() - period..];
    let n = period as f64;
    let (mut sx, mut sy, mut sxy, mut sx2) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in window.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sx2 += x * x;
    }
    let denom = n * sx2 - sx * sx;
    if denom.abs() < 1e-4 {
        return 0.0;
    }
    (n * sxy - sx * sy) / denom
}

/// Pearson correlation of two equally long samples.
///
/// Mismatched lengths are a caller bug and return `InvalidArgument`.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(FlowError::invalid_argument(
            "y",
            format!("length {} does not match x length {}", y.len(), x.len()),
        ));
    }
    if x.is_empty() {
        return Ok(0.0);
    }
    let n = x.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sx2, mut sy2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        sx += a;
        sy += b;
        sxy += a * b;
        sx2 += a * a;
        sy2 += b * b;
    }
    let num = n * sxy - sx * sy;
    let den = ((n * sx2 - sx * sx) * (n * sy2 - sy * sy)).sqrt();
    if !den.is_finite() || den < 1e-10 {
        return Ok(0.0);
    }
    Ok((num / den).clamp(-1.0, 1.0))
}

/// Signed strength of a disagreement between price direction and flow.
pub fn divergence_signal(price_slope: f64, flow: f64) -> f64 {
    if price_slope > 0.0 && flow < 0.0 {
        -(price_slope * flow).abs().sqrt()
    } else if price_slope < 0.0 && flow > 0.0 {
        (price_slope * flow).abs().sqrt()
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationRegime {
    /// Price and flow move against each other
    Inverse,
    /// No meaningful relationship
    Weak,
    /// Positive but fading
    Weakening,
    Aligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationThresholds {
    pub negative: f64,
    pub weak: f64,
    pub weakening: f64,
}

impl Default for CorrelationThresholds {
    fn default() -> Self {
        Self { negative: -0.2, weak: 0.2, weakening: 0.6 }
    }
}

impl CorrelationThresholds {
    pub fn classify(&self, rho: f64) -> CorrelationRegime {
        if rho < self.negative {
            CorrelationRegime::Inverse
        } else if rho.abs() < self.weak {
            CorrelationRegime::Weak
        } else if rho < self.weakening {
            CorrelationRegime::Weakening
        } else {
            CorrelationRegime::Aligned
        }
    }
}
