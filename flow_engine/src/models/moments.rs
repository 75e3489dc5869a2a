/// models/moments.rs: Running weighted mean and variance (VWAP/TWAP core)
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Per bar with price p and weight w (volume for VWAP, 1 for TWAP):
///     ΣPW  += p·w
///     ΣP²W += p²·w
///     ΣW   += w
///
///   On a reset bar the sums are replaced by the bar's own contribution.
///
///   μ  = ΣPW / max(ΣW, 1)
///   σ² = ΣP²W / max(ΣW, 1) − μ²      (clamped at 0)
///   σ  = √σ²
///   band_k = μ ± k·σ
/// ─────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MomentWeight {
    /// Weight each bar by its traded volume
    #[default]
    Volume,
    /// Weight every bar equally, regardless of duration
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentPhase {
    /// Nothing accumulated yet
    Empty,
    /// Sums hold only the bar that crossed the last boundary
    JustReset,
    Accumulating,
}

/// One σ-band tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub multiplier: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct RunningMomentStats {
    weighting: MomentWeight,
    cum_pv: f64,
    cum_pv2: f64,
    cum_w: f64,
    phase: MomentPhase,
}

impl RunningMomentStats {
    pub fn new(weighting: MomentWeight) -> Self {
        Self {
            weighting,
            cum_pv: 0.0,
            cum_pv2: 0.0,
            cum_w: 0.0,
            phase: MomentPhase::Empty,
        }
    }

    /// Fold one bar in.  With `reset` the previous sums are discarded and
    /// the bar seeds fresh ones.
    pub fn update(&mut self, price: f64, volume: f64, reset: bool) {
        let w = match self.weighting {
            MomentWeight::Volume => volume.max(0.0),
            MomentWeight::Equal  => 1.0,
        };
        if reset {
            self.cum_pv = price * w;
            self.cum_pv2 = price * price * w;
            self.cum_w = w;
            self.phase = MomentPhase::JustReset;
        } else {
            self.cum_pv += price * w;
            self.cum_pv2 += price * price * w;
            self.cum_w += w;
            self.phase = MomentPhase::Accumulating;
        }
    }

    pub fn mean(&self) -> f64 {
        self.cum_pv / self.cum_w.max(1.0)
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        (self.cum_pv2 / self.cum_w.max(1.0) - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn band(&self, multiplier: f64) -> Band {
        let mean = self.mean();
        let sd = self.std_dev();
        Band {
            multiplier,
            upper: mean + sd * multiplier,
            lower: mean - sd * multiplier,
        }
    }

    pub fn bands(&self, multipliers: &[f64]) -> Vec<Band> {
        multipliers.iter().map(|&k| self.band(k)).collect()
    }

    pub fn phase(&self) -> MomentPhase {
        self.phase
    }

    pub fn is_empty(&self) -> bool {
        self.phase == MomentPhase::Empty
    }

    pub fn cumulative_weight(&self) -> f64 {
        self.cum_w
    }

    /// Back to `Empty`, as if no bar had been seen.
    pub fn clear(&mut self) {
        *self = Self::new(self.weighting);
    }
}
