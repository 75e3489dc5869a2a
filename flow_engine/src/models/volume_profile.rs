/// models/volume_profile.rs: Price → volume histograms with POC and value area
///
/// ─────────────────────────────────────────────────────────────────────────
/// CONSTRUCTION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Rows live on an integer grid, the price rounded to the nearest row
///   (halves go up):  row = ⌊(2·ticks(price) + ticks_per_row) / (2·ticks_per_row)⌋
///   so keys never depend on floating-point equality.
///
///   Each sub-bar print adds its volume to the row of its close price,
///   attributed as
///     tick resolution:   close ≥ ask → buy,  close ≤ bid → sell,
///                        otherwise (or unusable quote) → other
///     coarse resolution: close > open → buy, close < open → sell,
///                        close = open → other
///
///   Periods:
///     Sessions   a print on a new calendar date finalises the live profile
///                and opens the next one
///     Bars(N)    a new profile opens every N display bars
///
///   Finalised profiles are frozen; only `recompute_value_areas` touches them.
/// ─────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::profile::{price_to_ticks, value_area, ValueArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfilePeriod {
    #[default]
    Sessions,
    /// A new profile every `n` display bars
    Bars(usize),
}

impl FromStr for ProfilePeriod {
    type Err = String;

    /// `sessions`, or `bars:N` / `bars=N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "sessions" || s == "session" {
            return Ok(ProfilePeriod::Sessions);
        }
        match s.strip_prefix("bars").map(|rest| rest.trim_start_matches(&[':', '='][..])) {
            Some(n) => n
                .trim()
                .parse::<usize>()
                .map(ProfilePeriod::Bars)
                .map_err(|e| format!("bad bar count in `{s}`: {e}")),
            None => Err(format!("unknown profile period `{s}`")),
        }
    }
}

impl fmt::Display for ProfilePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilePeriod::Sessions => f.write_str("sessions"),
            ProfilePeriod::Bars(n)  => write!(f, "bars:{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    pub buy: f64,
    pub sell: f64,
    pub other: f64,
}

impl ProfileRow {
    pub fn total(&self) -> f64 {
        self.buy + self.sell + self.other
    }
}

/// One profile covering bars `start_bar..=end_bar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub start_bar: usize,
    pub end_bar: usize,
    /// Calendar date of the first print (Sessions mode)
    pub session_date: Option<NaiveDate>,
    /// Price height of one row
    pub row_height: f64,
    rows: BTreeMap<i64, ProfileRow>,
    value_area: Option<ValueArea>,
    finalized: bool,
}

impl VolumeProfile {
    pub fn new(start_bar: usize, row_height: f64) -> Self {
        Self {
            start_bar,
            end_bar: start_bar,
            session_date: None,
            row_height,
            rows: BTreeMap::new(),
            value_area: None,
            finalized: false,
        }
    }

    pub fn add(&mut self, row: i64, buy: f64, sell: f64, other: f64) {
        let r = self.rows.entry(row).or_default();
        r.buy += buy;
        r.sell += sell;
        r.other += other;
    }

    pub fn rows(&self) -> &BTreeMap<i64, ProfileRow> {
        &self.rows
    }

    /// Price a row is centred on.
    pub fn row_price(&self, row: i64) -> f64 {
        row as f64 * self.row_height
    }

    pub fn total_volume(&self) -> f64 {
        self.rows.values().map(ProfileRow::total).sum()
    }

    pub fn max_volume(&self) -> f64 {
        self.rows.values().map(ProfileRow::total).fold(0.0, f64::max)
    }

    /// Recompute POC/VAH/VAL for `pct` ∈ (0, 1].
    pub fn calculate_value_area(&mut self, pct: f64) -> Option<ValueArea> {
        let totals: BTreeMap<i64, f64> =
            self.rows.iter().map(|(&k, r)| (k, r.total())).collect();
        self.value_area = value_area(&totals, pct);
        self.value_area
    }

    pub fn value_area(&self) -> Option<&ValueArea> {
        self.value_area.as_ref()
    }

    pub fn poc(&self) -> Option<f64> {
        self.value_area.map(|va| self.row_price(va.poc))
    }

    pub fn vah(&self) -> Option<f64> {
        self.value_area.map(|va| self.row_price(va.vah))
    }

    pub fn val(&self) -> Option<f64> {
        self.value_area.map(|va| self.row_price(va.val))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Builds the sequence of profiles from sub-bar prints and display-bar
/// closes.
#[derive(Debug, Clone)]
pub struct VolumeProfileEngine {
    period: ProfilePeriod,
    tick_size: f64,
    ticks_per_row: i64,
    value_area_pct: f64,
    profiles: Vec<VolumeProfile>,
    /// Index of the display bar currently being built
    current_bar: usize,
    bars_in_profile: usize,
    current_date: Option<NaiveDate>,
}

impl VolumeProfileEngine {
    pub fn new(period: ProfilePeriod, tick_size: f64, ticks_per_row: usize, value_area_pct: f64) -> Self {
        let ticks_per_row = ticks_per_row.max(1) as i64;
        Self {
            period,
            tick_size,
            ticks_per_row,
            value_area_pct,
            profiles: vec![VolumeProfile::new(0, tick_size * ticks_per_row as f64)],
            current_bar: 0,
            bars_in_profile: 0,
            current_date: None,
        }
    }

    fn row_of(&self, price: f64) -> i64 {
        let ticks = price_to_ticks(price, self.tick_size);
        (2 * ticks + self.ticks_per_row).div_euclid(2 * self.ticks_per_row)
    }

    /// Finest resolution: one trade with the quote in force.
    pub fn add_trade(&mut self, price: f64, bid: f64, ask: f64, volume: f64, time: NaiveDateTime) {
        let quote_ok = bid > 0.0 && ask > 0.0 && ask > bid;
        let (buy, sell, other) = if quote_ok && price >= ask {
            (volume, 0.0, 0.0)
        } else if quote_ok && price <= bid {
            (0.0, volume, 0.0)
        } else {
            (0.0, 0.0, volume)
        };
        self.add_print(price, buy, sell, other, time);
    }

    /// Coarse resolution: a sub-bar classified by its direction.
    pub fn add_sub_bar(&mut self, open: f64, close: f64, volume: f64, time: NaiveDateTime) {
        let (buy, sell, other) = if close > open {
            (volume, 0.0, 0.0)
        } else if close < open {
            (0.0, volume, 0.0)
        } else {
            (0.0, 0.0, volume)
        };
        self.add_print(close, buy, sell, other, time);
    }

    fn add_print(&mut self, price: f64, buy: f64, sell: f64, other: f64, time: NaiveDateTime) {
        if !(buy + sell + other).is_finite() || buy + sell + other <= 0.0 {
            return;
        }
        if self.period == ProfilePeriod::Sessions {
            let date = time.date();
            match self.current_date {
                Some(d) if d != date => {
                    self.roll_profile();
                    self.current_date = Some(date);
                }
                None => self.current_date = Some(date),
                _ => {}
            }
        }
        let row = self.row_of(price);
        if let Some(profile) = self.profiles.last_mut() {
            if profile.session_date.is_none() {
                profile.session_date = Some(time.date());
            }
            profile.add(row, buy, sell, other);
        }
    }

    /// Display bar `index` closed.
    pub fn on_bar_close(&mut self, index: usize) {
        let pct = self.value_area_pct;
        if let Some(profile) = self.profiles.last_mut() {
            profile.end_bar = index.max(profile.start_bar);
            profile.calculate_value_area(pct);
        }
        self.current_bar = index + 1;
        self.bars_in_profile += 1;

        if let ProfilePeriod::Bars(n) = self.period {
            if self.bars_in_profile >= n.max(1) {
                self.roll_profile();
            }
        }
    }

    /// Freeze the live profile and open a new one at the current bar.
    fn roll_profile(&mut self) {
        let pct = self.value_area_pct;
        let start = self.current_bar;
        if let Some(profile) = self.profiles.last_mut() {
            if profile.rows.is_empty() && profile.start_bar == start {
                // Nothing to freeze; keep building the same profile
                profile.session_date = None;
                return;
            }
            profile.calculate_value_area(pct);
            profile.finalized = true;
            debug!(
                start = profile.start_bar,
                end = profile.end_bar,
                poc = ?profile.poc(),
                "volume profile finalised"
            );
        }
        self.profiles.push(VolumeProfile::new(start, self.tick_size * self.ticks_per_row as f64));
        self.bars_in_profile = 0;
    }

    /// Recompute every profile's value area with a new percentage.
    pub fn recompute_value_areas(&mut self, pct: f64) {
        self.value_area_pct = pct;
        for p in &mut self.profiles {
            p.calculate_value_area(pct);
        }
    }

    pub fn profiles(&self) -> &[VolumeProfile] {
        &self.profiles
    }

    pub fn current(&self) -> Option<&VolumeProfile> {
        self.profiles.last()
    }
}
