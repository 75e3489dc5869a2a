/// models/moving_average.rs: Incremental SMA / EMA used for smoothing
///
///   SMA_t = (1/n) Σ_{i=t−n+1}^{t} x_i
///   EMA_t = k·x_t + (1 − k)·EMA_{t−1},   k = 2/(n+1),   EMA_0 = x_0
///
/// Both withhold output until `n` samples have been pushed.
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaType {
    None,
    Sma,
    #[default]
    Ema,
}

impl FromStr for MaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(MaType::None),
            "sma"          => Ok(MaType::Sma),
            "ema"          => Ok(MaType::Ema),
            other => Err(format!("unknown moving average `{other}`")),
        }
    }
}

impl fmt::Display for MaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaType::None => "none",
            MaType::Sma  => "sma",
            MaType::Ema  => "ema",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct MovingAverage {
    kind: MaType,
    length: usize,
    window: VecDeque<f64>,
    sum: f64,
    ema: Option<f64>,
    seen: usize,
}

impl MovingAverage {
    pub fn new(kind: MaType, length: usize) -> Self {
        let length = length.max(1);
        Self {
            kind,
            length,
            window: VecDeque::with_capacity(if kind == MaType::Sma { length } else { 0 }),
            sum: 0.0,
            ema: None,
            seen: 0,
        }
    }

    pub fn kind(&self) -> MaType {
        self.kind
    }

    /// Feed a sample; returns the average once `length` samples exist.
    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.seen += 1;
        match self.kind {
            MaType::None => None,
            MaType::Sma => {
                self.window.push_back(x);
                self.sum += x;
                if self.window.len() > self.length {
                    self.sum -= self.window.pop_front().unwrap_or(0.0);
                }
                self.value()
            }
            MaType::Ema => {
                let k = 2.0 / (self.length as f64 + 1.0);
                let next = match self.ema {
                    Some(prev) => k * x + (1.0 - k) * prev,
                    None => x,
                };
                self.ema = Some(next);
                self.value()
            }
        }
    }

    /// Current average, `None` while warming up.
    pub fn value(&self) -> Option<f64> {
        if self.seen < self.length {
            return None;
        }
        match self.kind {
            MaType::None => None,
            MaType::Sma => Some(self.sum / self.window.len() as f64),
            MaType::Ema => self.ema,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.value().is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.kind, self.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_trailing_window() {
        let mut ma = MovingAverage::new(MaType::Sma, 3);
        assert_eq!(ma.push(1.0), None);
        assert_eq!(ma.push(2.0), None);
        let v = ma.push(3.0).unwrap();
        assert!((v - 2.0).abs() < 1e-12, "v = {v}");
        let v = ma.push(6.0).unwrap();
        assert!((v - 11.0 / 3.0).abs() < 1e-12, "v = {v}");
    }

    #[test]
    fn ema_seeded_with_first_value() {
        let mut ma = MovingAverage::new(MaType::Ema, 3);
        ma.push(10.0);
        ma.push(10.0);
        let v = ma.push(14.0).unwrap();
        // k = 0.5
        assert!((v - 12.0).abs() < 1e-12, "v = {v}");
    }

    #[test]
    fn none_never_produces() {
        let mut ma = MovingAverage::new(MaType::None, 1);
        assert_eq!(ma.push(1.0), None);
        assert!(!ma.is_ready());
    }

    #[test]
    fn reset_restarts_warmup() {
        let mut ma = MovingAverage::new(MaType::Ema, 2);
        ma.push(1.0);
        ma.push(2.0);
        assert!(ma.is_ready());
        ma.reset();
        assert_eq!(ma.push(5.0), None);
    }
}
