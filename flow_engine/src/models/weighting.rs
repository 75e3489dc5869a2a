/// models/weighting.rs: Age weights for cumulative / weighted OFI
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   d = age in bars (0 = most recent bar)
///
///   Cumulative:   w(d) = 1
///   Exponential:  w(d) = exp(−λ·d)
///                 horizon H = min(⌈−ln(w_min)/λ⌉, 500),  w(d) = 0 for d > H
///   Linear:       w(d) = max(0, 1 − d/N)
///   FixedWindow:  w(d) = 1 if d < N else 0
///
///   COFI/WOFI_t = Σ_i w(t − i) · OFI_i · V_i
/// ─────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default weight below which exponential contributions are ignored.
pub const DEFAULT_MIN_WEIGHT: f64 = 0.01;
/// Hard cap on the exponential horizon, in bars.
pub const MAX_EXPONENTIAL_LOOKBACK: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightingKind {
    /// Plain running sum (COFI)
    Cumulative,
    /// Exponential decay (WOFI)
    #[default]
    Exponential,
    Linear,
    FixedWindow,
}

impl FromStr for WeightingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "cumulative" | "cofi"  => Ok(WeightingKind::Cumulative),
            "exponential" | "wofi" => Ok(WeightingKind::Exponential),
            "linear"               => Ok(WeightingKind::Linear),
            "fixedwindow" | "fixed" => Ok(WeightingKind::FixedWindow),
            other => Err(format!("unknown weighting `{other}`")),
        }
    }
}

impl fmt::Display for WeightingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeightingKind::Cumulative  => "cumulative",
            WeightingKind::Exponential => "exponential",
            WeightingKind::Linear      => "linear",
            WeightingKind::FixedWindow => "fixed-window",
        };
        f.write_str(name)
    }
}

/// A fully parameterised weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightingScheme {
    Cumulative,
    Exponential { lambda: f64 },
    Linear { window: usize },
    FixedWindow { window: usize },
}

impl WeightingScheme {
    pub fn from_kind(kind: WeightingKind, lambda: f64, window: usize) -> Self {
        match kind {
            WeightingKind::Cumulative  => WeightingScheme::Cumulative,
            WeightingKind::Exponential => WeightingScheme::Exponential { lambda },
            WeightingKind::Linear      => WeightingScheme::Linear { window },
            WeightingKind::FixedWindow => WeightingScheme::FixedWindow { window },
        }
    }

    /// Weight applied to a bar `age` bars before the most recent one.
    pub fn weight(&self, age: usize) -> f64 {
        match *self {
            WeightingScheme::Cumulative => 1.0,
            WeightingScheme::Exponential { lambda } => {
                if age > exponential_horizon(lambda) {
                    0.0
                } else {
                    exponential_weight(age, lambda)
                }
            }
            WeightingScheme::Linear { window } => linear_weight(age, window),
            WeightingScheme::FixedWindow { window } => {
                if age < window { 1.0 } else { 0.0 }
            }
        }
    }

    /// Largest age that can carry a non-zero weight (`None` = unbounded).
    pub fn horizon(&self) -> Option<usize> {
        match *self {
            WeightingScheme::Cumulative => None,
            WeightingScheme::Exponential { lambda } => Some(exponential_horizon(lambda)),
            WeightingScheme::Linear { window } | WeightingScheme::FixedWindow { window } => {
                Some(window.saturating_sub(1))
            }
        }
    }
}

/// w(d) = exp(−λ·d)
pub fn exponential_weight(age: usize, lambda: f64) -> f64 {
    (-lambda * age as f64).exp()
}

/// w(d) = 1 − d/N for d < N, else 0.
pub fn linear_weight(age: usize, window: usize) -> f64 {
    if age >= window {
        return 0.0;
    }
    1.0 - age as f64 / window as f64
}

/// Bars until exp(−λ·d) falls to `min_weight`:  ⌈−ln(min_weight)/λ⌉.
pub fn effective_lookback(lambda: f64, min_weight: f64) -> usize {
    if lambda <= 0.0 || min_weight <= 0.0 || min_weight >= 1.0 {
        return MAX_EXPONENTIAL_LOOKBACK;
    }
    (-min_weight.ln() / lambda).ceil() as usize
}

fn exponential_horizon(lambda: f64) -> usize {
    effective_lookback(lambda, DEFAULT_MIN_WEIGHT).min(MAX_EXPONENTIAL_LOOKBACK)
}
