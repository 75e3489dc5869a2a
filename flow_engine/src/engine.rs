/// engine.rs: Host-facing order-flow engine
///
/// One `OrderFlowEngine` per instrument series.  The host pushes trades with
/// `on_tick` and closes display bars with `on_bar_close`; every component is
/// owned here and driven in a fixed order, so a bar's snapshot always sees
/// all of that bar's trades.
///
/// Tick routing:
///   OFI histogram   (its own classifier, configurable method)
///   COFI / WOFI     (its own classifier, configurable method)
///   aggressor ratio (touch-distance buckets)
///   CVD             (bid/ask with 50/50 split)
///   volume profile  (tick = finest sub-bar)
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::data::{Bar, PriceSource, Tick};
use crate::error::{FlowError, Result};
use crate::indicators::{
    AnchoredVwap, CofiIndicator, CofiOutput, DivergenceIndicator, DivergenceOutput, OfiHistogram,
    OfiOutput, VwapIndicator, VwapOutput,
};
use crate::models::aggressor::{AggressorOutput, AggressorRatio};
use crate::models::cvd::{CumulativeDelta, CvdBar};
use crate::models::session_stats::{ProbabilityZones, SessionReturnDistribution};
use crate::models::tpo::{TpoBlock, TpoEngine, TpoSession};
use crate::models::volume_profile::{VolumeProfile, VolumeProfileEngine};
use crate::models::MomentWeight;

/// POC / VAH / VAL of a profile, in price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileLevels {
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
}

impl ProfileLevels {
    fn of_volume(p: &VolumeProfile) -> Option<Self> {
        Some(Self { poc: p.poc()?, vah: p.vah()?, val: p.val()? })
    }

    fn of_tpo(s: &TpoSession) -> Option<Self> {
        Some(Self { poc: s.poc()?, vah: s.vah()?, val: s.val()? })
    }
}

/// Every series value for one closed bar.  `None` marks a withheld value
/// (not enough history yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSnapshot {
    pub index: usize,
    pub time: NaiveDateTime,
    pub session_date: NaiveDate,
    pub ofi: OfiOutput,
    pub cofi: CofiOutput,
    pub divergence: Option<DivergenceOutput>,
    pub vwap: VwapOutput,
    pub twap: VwapOutput,
    pub anchored_vwap: Option<VwapOutput>,
    pub aggressor: AggressorOutput,
    pub cvd: CvdBar,
    pub volume_profile: Option<ProfileLevels>,
    pub tpo: Option<ProfileLevels>,
    /// The TPO session was rebuilt by this bar
    pub tpo_redrawn: bool,
    /// Blocks created by this bar (the whole session after a rebuild)
    pub tpo_blocks: Vec<TpoBlock>,
    pub zones: Option<ProbabilityZones>,
}

pub struct OrderFlowEngine {
    config: EngineConfig,
    ofi: OfiHistogram,
    cofi: CofiIndicator,
    divergence: DivergenceIndicator,
    vwap: VwapIndicator,
    twap: VwapIndicator,
    anchored: AnchoredVwap,
    aggressor: AggressorRatio,
    cvd: CumulativeDelta,
    volume_profile: VolumeProfileEngine,
    tpo: TpoEngine,
    session_stats: SessionReturnDistribution,
    /// Latest accepted event time
    last_time: Option<NaiveDateTime>,
    ticks_dropped: u64,
    bars_closed: u64,
}

impl OrderFlowEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let of = &config.order_flow;
        let ofi = OfiHistogram::new(
            of.ofi_classification,
            of.ofi_ma_type,
            of.ofi_ma_length,
            of.ofi_threshold,
            of.ofi_strong_threshold,
        );
        let cofi = CofiIndicator::new(
            of.cofi_classification,
            of.scheme(),
            of.reset_period,
            (of.ma1_type, of.ma1_length),
            (of.ma2_type, of.ma2_length),
        );

        let dc = &config.divergence;
        let divergence = DivergenceIndicator::new(
            dc.regression_period,
            dc.correlation_period,
            if dc.smooth { dc.smoothing_period } else { 0 },
            dc.thresholds,
        );

        let vc = &config.vwap;
        let vwap = VwapIndicator::new(MomentWeight::Volume, vc.price_source, vc.reset, vc.band_multipliers.clone());
        let twap = VwapIndicator::new(MomentWeight::Equal, vc.price_source, vc.reset, vc.band_multipliers.clone());
        let anchored = AnchoredVwap::new(vc.anchor_bar, vc.price_source, vc.band_multipliers.clone());

        let ac = &config.aggressor;
        let aggressor = AggressorRatio::new(ac.lookback, ac.smoothing, ac.reset_on_session);
        let cvd = CumulativeDelta::new(config.cvd.reset);

        let pc = &config.volume_profile;
        let volume_profile = VolumeProfileEngine::new(pc.period, config.tick_size, pc.ticks_per_row, pc.value_area);

        let tc = &config.tpo;
        let tpo = TpoEngine::new(config.tick_size, tc.box_height_ticks, tc.period_minutes, tc.value_area);

        let session_stats = SessionReturnDistribution::new(config.session_stats.lookback);

        info!(
            weighting = ?config.order_flow.scheme(),
            tick_size = config.tick_size,
            vwap_source = %config.vwap.price_source,
            "order-flow engine ready"
        );

        Ok(Self {
            config,
            ofi,
            cofi,
            divergence,
            vwap,
            twap,
            anchored,
            aggressor,
            cvd,
            volume_profile,
            tpo,
            session_stats,
            last_time: None,
            ticks_dropped: 0,
            bars_closed: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── INPUT ────────────────────────────────────────────────────────────

    /// Route one trade to every tick-driven component.
    /// Returns false when the trade was dropped.
    pub fn on_tick(&mut self, tick: &Tick) -> bool {
        if let Some(last) = self.last_time {
            if tick.time < last {
                self.ticks_dropped += 1;
                warn!(time = %tick.time, last = %last, "out-of-order tick dropped");
                return false;
            }
        }
        if !(tick.price.is_finite() && tick.volume.is_finite()) {
            self.ticks_dropped += 1;
            debug!(price = tick.price, volume = tick.volume, "non-finite tick dropped");
            return false;
        }
        self.last_time = Some(tick.time);

        self.ofi.on_tick(tick);
        self.cofi.on_tick(tick);
        self.aggressor.add_trade(tick.price, tick.bid, tick.ask, tick.volume);
        self.cvd.add_trade(tick.price, tick.bid, tick.ask, tick.volume);
        self.volume_profile.add_trade(tick.price, tick.bid, tick.ask, tick.volume, tick.time);
        true
    }

    /// Close a display bar across all components.
    pub fn on_bar_close(&mut self, bar: &Bar) -> BarSnapshot {
        if bar.is_first_of_session {
            debug!(bar = bar.index, date = %bar.session_date, "session start");
        }

        let ofi = self.ofi.close_bar(bar.index);
        let cofi = self.cofi.close_bar(bar.index);
        let divergence = self.divergence.update(bar.close, cofi.cofi);

        let vwap = self.vwap.on_bar(bar);
        let twap = self.twap.on_bar(bar);
        let anchored_vwap = self.anchored.on_bar(bar);

        let aggressor = self.aggressor.close_bar(bar);
        let cvd = self.cvd.close_bar(bar);

        self.volume_profile.on_bar_close(bar.index);
        let volume_profile = self
            .volume_profile
            .profiles()
            .iter()
            .rev()
            .find(|p| p.start_bar <= bar.index)
            .and_then(ProfileLevels::of_volume);

        let update = self.tpo.on_bar_close(bar);
        let tpo = self.tpo.current().and_then(ProfileLevels::of_tpo);

        let zones = self.session_stats.on_bar(bar);

        self.last_time = Some(self.last_time.map_or(bar.open_time, |t| t.max(bar.open_time)));
        self.bars_closed += 1;

        BarSnapshot {
            index: bar.index,
            time: bar.open_time,
            session_date: bar.session_date,
            ofi,
            cofi,
            divergence,
            vwap,
            twap,
            anchored_vwap,
            aggressor,
            cvd,
            volume_profile,
            tpo,
            tpo_redrawn: update.redrawn,
            tpo_blocks: update.blocks,
            zones,
        }
    }

    // ── CONTROL ──────────────────────────────────────────────────────────

    /// Move the anchored VWAP; `anchor_price` picks the price source from
    /// where the anchor sits on its bar.
    pub fn set_anchor(&mut self, index: usize, anchor_price: Option<f64>) {
        self.anchored.set_anchor(index, anchor_price, self.config.tick_size);
        self.config.vwap.anchor_bar = Some(index);
    }

    pub fn set_anchor_price_source(&mut self, source: PriceSource) {
        self.anchored.set_price_source(source);
    }

    /// Recompute every volume-profile and TPO value area at a new percentage.
    pub fn set_value_area(&mut self, pct: f64) -> Result<()> {
        if !(pct > 0.0 && pct <= 1.0) {
            return Err(FlowError::invalid_argument("pct", format!("{pct} is outside (0, 1]")));
        }
        self.volume_profile.recompute_value_areas(pct);
        self.tpo.recompute_value_areas(pct);
        self.config.volume_profile.value_area = pct;
        self.config.tpo.value_area = pct;
        info!(pct, "value areas recomputed");
        Ok(())
    }

    // ── QUERIES ──────────────────────────────────────────────────────────

    pub fn volume_profiles(&self) -> &[VolumeProfile] {
        self.volume_profile.profiles()
    }

    pub fn tpo_sessions(&self) -> &[TpoSession] {
        self.tpo.sessions()
    }

    pub fn cofi(&self) -> &CofiIndicator {
        &self.cofi
    }

    pub fn cvd(&self) -> f64 {
        self.cvd.value()
    }

    pub fn ticks_dropped(&self) -> u64 {
        self.ticks_dropped
    }

    pub fn bars_closed(&self) -> u64 {
        self.bars_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;
    use crate::models::WeightingKind;

    fn engine() -> OrderFlowEngine {
        let mut cfg = EngineConfig::default();
        cfg.order_flow.weighting = WeightingKind::Cumulative;
        cfg.aggressor.lookback = 0;
        cfg.divergence.regression_period = 2;
        cfg.divergence.correlation_period = 2;
        cfg.divergence.smooth = false;
        OrderFlowEngine::new(cfg).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = EngineConfig::default();
        cfg.tpo.box_height_ticks = 0;
        assert!(matches!(OrderFlowEngine::new(cfg), Err(FlowError::InvalidConfig { .. })));
    }

    #[test]
    fn buy_ticks_close_to_full_imbalance() {
        let mut e = engine();
        let t = at(4, 9, 30);
        for _ in 0..3 {
            assert!(e.on_tick(&tick(100.25, 100.0, 100.25, 2.0, t)));
        }
        let snap = e.on_bar_close(&bar(0, t, [100.0, 100.25, 100.0, 100.25], 6.0, true));

        assert_eq!(snap.ofi.bar.ofi, 1.0);
        assert_eq!(snap.ofi.bar.volume, 6.0);
        assert_eq!(snap.cofi.cofi, 6.0);
        assert_eq!(snap.cvd.delta, 6.0);
        assert_eq!(snap.cvd.close, 6.0);
        assert_eq!(snap.aggressor.ratio, Some(1.0));
        assert!(snap.divergence.is_none());
        assert_eq!(snap.anchored_vwap, None);

        let vp = snap.volume_profile.unwrap();
        assert!((vp.poc - 100.25).abs() < 1e-9, "poc = {}", vp.poc);
        assert!(snap.tpo.is_some());
        assert!(!snap.tpo_blocks.is_empty());
    }

    #[test]
    fn out_of_order_tick_is_dropped() {
        let mut e = engine();
        assert!(e.on_tick(&tick(100.25, 100.0, 100.25, 1.0, at(4, 9, 31))));
        assert!(!e.on_tick(&tick(100.0, 100.0, 100.25, 5.0, at(4, 9, 30))));
        assert_eq!(e.ticks_dropped(), 1);

        let snap = e.on_bar_close(&bar(0, at(4, 9, 30), [100.0; 4], 1.0, true));
        assert_eq!(snap.ofi.bar.volume, 1.0);
        assert_eq!(snap.ofi.bar.ofi, 1.0);
    }

    #[test]
    fn session_boundary_resets_vwap_and_profile() {
        let mut e = engine();
        e.on_tick(&tick(100.0, 99.75, 100.0, 4.0, at(4, 9, 30)));
        e.on_bar_close(&bar(0, at(4, 9, 30), [100.0; 4], 4.0, true));
        e.on_tick(&tick(101.0, 100.75, 101.0, 4.0, at(4, 9, 31)));
        let s1 = e.on_bar_close(&bar(1, at(4, 9, 31), [101.0; 4], 4.0, false));
        assert!((s1.vwap.value - 100.5).abs() < 1e-9, "vwap = {}", s1.vwap.value);

        e.on_tick(&tick(110.0, 109.75, 110.0, 2.0, at(5, 9, 30)));
        let s2 = e.on_bar_close(&bar(2, at(5, 9, 30), [110.0; 4], 2.0, true));
        assert!(s2.vwap.reset);
        assert!((s2.vwap.value - 110.0).abs() < 1e-9);
        assert!((s2.twap.value - 110.0).abs() < 1e-9);

        assert_eq!(e.volume_profiles().len(), 2);
        assert!(e.volume_profiles()[0].is_finalized());
        assert_eq!(e.tpo_sessions().len(), 2);
        assert!((s2.volume_profile.unwrap().poc - 110.0).abs() < 1e-9);
    }

    #[test]
    fn divergence_appears_after_warmup() {
        let mut e = engine();
        for i in 0..3usize {
            let t = at(4, 10, i as u32);
            // Price rising on selling
            let px = 100.0 + i as f64;
            e.on_tick(&tick(px, px, px + 0.25, 1.0, t));
            let snap = e.on_bar_close(&bar(i, t, [px; 4], 1.0, i == 0));
            assert_eq!(snap.divergence.is_some(), i >= 1);
            if let Some(d) = snap.divergence {
                assert!(d.raw < 0.0, "raw = {}", d.raw);
            }
        }
    }

    #[test]
    fn anchor_and_value_area_controls() {
        let mut e = engine();
        for i in 0..3usize {
            let t = at(4, 9, 30 + i as u32);
            let px = 100.0 + i as f64;
            e.on_tick(&tick(px, px - 0.25, px, 1.0, t));
            e.on_bar_close(&bar(i, t, [px; 4], 1.0, i == 0));
        }
        e.set_anchor(1, None);
        e.on_tick(&tick(103.0, 102.75, 103.0, 1.0, at(4, 9, 33)));
        let snap = e.on_bar_close(&bar(3, at(4, 9, 33), [103.0; 4], 1.0, false));
        let avwap = snap.anchored_vwap.unwrap();
        assert!((avwap.value - 102.0).abs() < 1e-9, "avwap = {}", avwap.value);

        assert!(e.set_value_area(0.5).is_ok());
        assert!(matches!(e.set_value_area(0.0), Err(FlowError::InvalidArgument { .. })));
    }

    #[test]
    fn snapshot_serializes() {
        let mut e = engine();
        e.on_tick(&tick(100.0, 99.75, 100.0, 1.0, at(4, 9, 30)));
        let snap = e.on_bar_close(&bar(0, at(4, 9, 30), [100.0; 4], 1.0, true));
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"cofi\""));
        let back: BarSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index, 0);
    }
}
