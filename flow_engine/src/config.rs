/// config.rs: Centralised configuration loaded from .env
///
/// Every parameter consumed by the order-flow engine is defined here, one
/// section per component.  `Default` carries the stock indicator settings;
/// `from_env` overrides any of them through `FLOW_*` variables.  Loading
/// happens once at startup and the engine validates the result.
use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::PriceSource;
use crate::error::FlowError;
use crate::models::regression::CorrelationThresholds;
use crate::models::volume_profile::ProfilePeriod;
use crate::models::{ClassificationMethod, MaType, ResetPeriod, WeightingKind, WeightingScheme};

/// E-mini style quarter-point tick
pub const DEFAULT_TICK_SIZE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowConfig {
    // ── OFI histogram ────────────────────────────────────────────────
    pub ofi_classification: ClassificationMethod,
    pub ofi_ma_type: MaType,
    pub ofi_ma_length: usize,
    /// |OFI| at or above this is a Buy/Sell bar
    pub ofi_threshold: f64,
    /// |OFI| at or above this is a strong bar
    pub ofi_strong_threshold: f64,

    // ── COFI / WOFI ──────────────────────────────────────────────────
    pub cofi_classification: ClassificationMethod,
    pub weighting: WeightingKind,
    /// Exponential decay rate λ
    pub lambda: f64,
    /// Window for Linear / FixedWindow weighting
    pub window: usize,
    /// Bars of history retained (0 = unbounded)
    pub reset_period: usize,
    pub ma1_type: MaType,
    pub ma1_length: usize,
    pub ma2_type: MaType,
    pub ma2_length: usize,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            ofi_classification: ClassificationMethod::LeeReady,
            ofi_ma_type: MaType::Ema,
            ofi_ma_length: 14,
            ofi_threshold: 0.3,
            ofi_strong_threshold: 0.6,
            cofi_classification: ClassificationMethod::LeeReady,
            weighting: WeightingKind::Exponential,
            lambda: 0.05,
            window: 100,
            reset_period: 0,
            ma1_type: MaType::Ema,
            ma1_length: 12,
            ma2_type: MaType::Ema,
            ma2_length: 26,
        }
    }
}

impl OrderFlowConfig {
    pub fn scheme(&self) -> WeightingScheme {
        WeightingScheme::from_kind(self.weighting, self.lambda, self.window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapConfig {
    pub price_source: PriceSource,
    pub reset: ResetPeriod,
    /// σ multipliers, one band pair each
    pub band_multipliers: Vec<f64>,
    /// Anchor bar for the anchored VWAP (none = disabled until set)
    pub anchor_bar: Option<usize>,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            price_source: PriceSource::Hlc3,
            reset: ResetPeriod::Session,
            band_multipliers: vec![1.0, 2.0],
            anchor_bar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfileConfig {
    pub period: ProfilePeriod,
    pub ticks_per_row: usize,
    /// Fraction of volume inside the value area, in (0, 1]
    pub value_area: f64,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self { period: ProfilePeriod::Sessions, ticks_per_row: 1, value_area: 0.70 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpoConfig {
    pub box_height_ticks: usize,
    /// Minutes per TPO period (one letter)
    pub period_minutes: usize,
    pub value_area: f64,
}

impl Default for TpoConfig {
    fn default() -> Self {
        Self { box_height_ticks: 10, period_minutes: 30, value_area: 0.70 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceConfig {
    pub regression_period: usize,
    pub correlation_period: usize,
    pub smooth: bool,
    pub smoothing_period: usize,
    pub thresholds: CorrelationThresholds,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            regression_period: 20,
            correlation_period: 20,
            smooth: true,
            smoothing_period: 5,
            thresholds: CorrelationThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggressorConfig {
    pub lookback: usize,
    pub smoothing: usize,
    pub reset_on_session: bool,
}

impl Default for AggressorConfig {
    fn default() -> Self {
        Self { lookback: 20, smoothing: 5, reset_on_session: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvdConfig {
    pub reset: ResetPeriod,
}

impl Default for CvdConfig {
    fn default() -> Self {
        Self { reset: ResetPeriod::NoReset }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatsConfig {
    /// Completed sessions kept in the return distribution
    pub lookback: usize,
}

impl Default for SessionStatsConfig {
    fn default() -> Self {
        Self { lookback: 250 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tick_size: f64,
    pub order_flow: OrderFlowConfig,
    pub vwap: VwapConfig,
    pub volume_profile: VolumeProfileConfig,
    pub tpo: TpoConfig,
    pub divergence: DivergenceConfig,
    pub aggressor: AggressorConfig,
    pub cvd: CvdConfig,
    pub session_stats: SessionStatsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_size: DEFAULT_TICK_SIZE,
            order_flow: OrderFlowConfig::default(),
            vwap: VwapConfig::default(),
            volume_profile: VolumeProfileConfig::default(),
            tpo: TpoConfig::default(),
            divergence: DivergenceConfig::default(),
            aggressor: AggressorConfig::default(),
            cvd: CvdConfig::default(),
            session_stats: SessionStatsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env

        let d = EngineConfig::default();

        let band_multipliers = match env::var("FLOW_VWAP_BANDS") {
            Ok(v) => parse_list("FLOW_VWAP_BANDS", &v)?,
            Err(_) => d.vwap.band_multipliers.clone(),
        };
        let anchor_bar = match env::var("FLOW_AVWAP_ANCHOR") {
            Ok(v) => Some(
                v.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Config key FLOW_AVWAP_ANCHOR: `{v}`"))?,
            ),
            Err(_) => d.vwap.anchor_bar,
        };

        let cfg = Self {
            tick_size: parse_env("FLOW_TICK_SIZE", d.tick_size)?,

            order_flow: OrderFlowConfig {
                ofi_classification:   parse_env("FLOW_OFI_CLASSIFICATION", d.order_flow.ofi_classification)?,
                ofi_ma_type:          parse_env("FLOW_OFI_MA_TYPE",        d.order_flow.ofi_ma_type)?,
                ofi_ma_length:        parse_env("FLOW_OFI_MA_LENGTH",      d.order_flow.ofi_ma_length)?,
                ofi_threshold:        parse_env("FLOW_OFI_THRESHOLD",      d.order_flow.ofi_threshold)?,
                ofi_strong_threshold: parse_env("FLOW_OFI_STRONG_THRESHOLD", d.order_flow.ofi_strong_threshold)?,
                cofi_classification:  parse_env("FLOW_COFI_CLASSIFICATION", d.order_flow.cofi_classification)?,
                weighting:    parse_env("FLOW_COFI_WEIGHTING",    d.order_flow.weighting)?,
                lambda:       parse_env("FLOW_COFI_LAMBDA",       d.order_flow.lambda)?,
                window:       parse_env("FLOW_COFI_WINDOW",       d.order_flow.window)?,
                reset_period: parse_env("FLOW_COFI_RESET_PERIOD", d.order_flow.reset_period)?,
                ma1_type:     parse_env("FLOW_COFI_MA1_TYPE",     d.order_flow.ma1_type)?,
                ma1_length:   parse_env("FLOW_COFI_MA1_LENGTH",   d.order_flow.ma1_length)?,
                ma2_type:     parse_env("FLOW_COFI_MA2_TYPE",     d.order_flow.ma2_type)?,
                ma2_length:   parse_env("FLOW_COFI_MA2_LENGTH",   d.order_flow.ma2_length)?,
            },

            vwap: VwapConfig {
                price_source: parse_env("FLOW_VWAP_PRICE_SOURCE", d.vwap.price_source)?,
                reset:        parse_env("FLOW_VWAP_RESET",        d.vwap.reset)?,
                band_multipliers,
                anchor_bar,
            },

            volume_profile: VolumeProfileConfig {
                period:        parse_env("FLOW_PROFILE_PERIOD",        d.volume_profile.period)?,
                ticks_per_row: parse_env("FLOW_PROFILE_TICKS_PER_ROW", d.volume_profile.ticks_per_row)?,
                value_area:    parse_env("FLOW_PROFILE_VALUE_AREA",    d.volume_profile.value_area)?,
            },

            tpo: TpoConfig {
                box_height_ticks: parse_env("FLOW_TPO_BOX_TICKS",      d.tpo.box_height_ticks)?,
                period_minutes:   parse_env("FLOW_TPO_PERIOD_MINUTES", d.tpo.period_minutes)?,
                value_area:       parse_env("FLOW_TPO_VALUE_AREA",     d.tpo.value_area)?,
            },

            divergence: DivergenceConfig {
                regression_period:  parse_env("FLOW_DIV_REGRESSION_PERIOD",  d.divergence.regression_period)?,
                correlation_period: parse_env("FLOW_DIV_CORRELATION_PERIOD", d.divergence.correlation_period)?,
                smooth:             parse_env("FLOW_DIV_SMOOTH",             d.divergence.smooth)?,
                smoothing_period:   parse_env("FLOW_DIV_SMOOTHING_PERIOD",   d.divergence.smoothing_period)?,
                thresholds: CorrelationThresholds {
                    negative:  parse_env("FLOW_DIV_NEGATIVE_THRESHOLD",  d.divergence.thresholds.negative)?,
                    weak:      parse_env("FLOW_DIV_WEAK_THRESHOLD",      d.divergence.thresholds.weak)?,
                    weakening: parse_env("FLOW_DIV_WEAKENING_THRESHOLD", d.divergence.thresholds.weakening)?,
                },
            },

            aggressor: AggressorConfig {
                lookback:         parse_env("FLOW_AGGRESSOR_LOOKBACK",  d.aggressor.lookback)?,
                smoothing:        parse_env("FLOW_AGGRESSOR_SMOOTHING", d.aggressor.smoothing)?,
                reset_on_session: parse_env("FLOW_AGGRESSOR_SESSION_RESET", d.aggressor.reset_on_session)?,
            },

            cvd: CvdConfig {
                reset: parse_env("FLOW_CVD_RESET", d.cvd.reset)?,
            },

            session_stats: SessionStatsConfig {
                lookback: parse_env("FLOW_SESSION_LOOKBACK", d.session_stats.lookback)?,
            },
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> std::result::Result<(), FlowError> {
        if !(self.tick_size > 0.0 && self.tick_size.is_finite()) {
            return Err(FlowError::invalid_config("tick_size", "must be a positive number"));
        }

        let of = &self.order_flow;
        if of.weighting == WeightingKind::Exponential && !(of.lambda > 0.0 && of.lambda.is_finite()) {
            return Err(FlowError::invalid_config("order_flow.lambda", "must be positive"));
        }
        if matches!(of.weighting, WeightingKind::Linear | WeightingKind::FixedWindow) && of.window == 0 {
            return Err(FlowError::invalid_config("order_flow.window", "must be at least 1"));
        }
        if of.ofi_threshold < 0.0 || of.ofi_strong_threshold < of.ofi_threshold {
            return Err(FlowError::invalid_config(
                "order_flow.ofi_strong_threshold",
                "thresholds must satisfy 0 ≤ level ≤ strong",
            ));
        }

        check_fraction("volume_profile.value_area", self.volume_profile.value_area)?;
        check_fraction("tpo.value_area", self.tpo.value_area)?;
        if self.volume_profile.period == ProfilePeriod::Bars(0) {
            return Err(FlowError::invalid_config("volume_profile.period", "bar count must be at least 1"));
        }
        if self.volume_profile.ticks_per_row == 0 {
            return Err(FlowError::invalid_config("volume_profile.ticks_per_row", "must be at least 1"));
        }
        if self.tpo.box_height_ticks == 0 {
            return Err(FlowError::invalid_config("tpo.box_height_ticks", "must be at least 1"));
        }
        if self.tpo.period_minutes == 0 {
            return Err(FlowError::invalid_config("tpo.period_minutes", "must be at least 1"));
        }
        if self.divergence.regression_period < 2 {
            return Err(FlowError::invalid_config("divergence.regression_period", "must be at least 2"));
        }
        if self.divergence.correlation_period < 2 {
            return Err(FlowError::invalid_config("divergence.correlation_period", "must be at least 2"));
        }
        if self.vwap.band_multipliers.iter().any(|k| !(k.is_finite() && *k >= 0.0)) {
            return Err(FlowError::invalid_config("vwap.band_multipliers", "must be non-negative numbers"));
        }
        Ok(())
    }
}

fn check_fraction(key: &str, v: f64) -> std::result::Result<(), FlowError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(FlowError::invalid_config(key, format!("{v} is outside (0, 1]")))
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Comma-separated list, e.g. `FLOW_VWAP_BANDS=1,2,3`.
fn parse_list(key: &str, raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|e| anyhow::anyhow!("Config key {key}: `{s}`: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.order_flow.scheme(), WeightingScheme::Exponential { lambda: 0.05 });
        assert_eq!(cfg.vwap.band_multipliers, vec![1.0, 2.0]);
        assert_eq!(cfg.tpo.box_height_ticks, 10);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = EngineConfig::default();
        cfg.order_flow.lambda = 0.0;
        assert!(matches!(cfg.validate(), Err(FlowError::InvalidConfig { .. })));

        let mut cfg = EngineConfig::default();
        cfg.volume_profile.value_area = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.tick_size = -0.25;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.tpo.period_minutes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.order_flow.weighting = WeightingKind::FixedWindow;
        cfg.order_flow.window = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lambda_only_matters_for_exponential() {
        let mut cfg = EngineConfig::default();
        cfg.order_flow.weighting = WeightingKind::Cumulative;
        cfg.order_flow.lambda = 0.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn list_parsing() {
        assert_eq!(parse_list("K", "1, 2.5 ,3").unwrap(), vec![1.0, 2.5, 3.0]);
        assert!(parse_list("K", "1,x").is_err());
    }

    #[test]
    fn env_overrides() {
        env::set_var("FLOW_COFI_WEIGHTING", "fixed-window");
        env::set_var("FLOW_COFI_WINDOW", "3");
        env::set_var("FLOW_VWAP_BANDS", "0.5,1.5");
        env::set_var("FLOW_PROFILE_PERIOD", "bars:20");
        let cfg = EngineConfig::from_env().unwrap();
        env::remove_var("FLOW_COFI_WEIGHTING");
        env::remove_var("FLOW_COFI_WINDOW");
        env::remove_var("FLOW_VWAP_BANDS");
        env::remove_var("FLOW_PROFILE_PERIOD");

        assert_eq!(cfg.order_flow.scheme(), WeightingScheme::FixedWindow { window: 3 });
        assert_eq!(cfg.vwap.band_multipliers, vec![0.5, 1.5]);
        assert_eq!(cfg.volume_profile.period, ProfilePeriod::Bars(20));
    }
}
