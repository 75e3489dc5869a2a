/// models/tpo.rs: Time-Price-Opportunity profile per session
///
/// ─────────────────────────────────────────────────────────────────────────
/// CONSTRUCTION
/// ─────────────────────────────────────────────────────────────────────────
///
///   All prices are integer ticks.  With box height h (ticks) and session
///   low L:
///     aligned low  A = ⌊L / h⌋ · h
///     bucket b     covers [A + b·h, A + (b+1)·h)
///     a bar touches b when high ≥ bottom(b) and low < top(b)
///
///   Time period of a bar:
///     p = ⌊minutes since session start / period_minutes⌋
///
///   Each bucket holds the set of periods that touched it, so a
///   (bucket, period) pair counts once no matter how many bars repeat it.
///   Every first touch emits a block whose column is the number of periods
///   already recorded in that bucket; letters run A–Z, a–z, then repeat.
///
///   A new session high or low moves A, so the whole session is rebuilt from
///   its retained bar list instead of being patched.
///
///   POC / VAH / VAL: greedy value area over the period counts, reported at
///   bucket midpoints.
/// ─────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use ahash::AHashSet;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::profile::{price_to_ticks, value_area, ValueArea};
use crate::data::Bar;

/// Letter for a 0-based block column.
pub fn tpo_letter(column: usize) -> char {
    let i = column % 52;
    if i < 26 {
        (b'A' + i as u8) as char
    } else {
        (b'a' + (i - 26) as u8) as char
    }
}

/// A drawable TPO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpoBlock {
    pub bucket: i64,
    pub period: i64,
    /// 0-based position of this period among the bucket's periods
    pub column: usize,
    pub letter: char,
}

#[derive(Debug, Clone, Copy)]
struct TpoBar {
    high: i64,
    low: i64,
    period: i64,
}

/// What a bar close did to the live session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TpoUpdate {
    /// The bar opened a new session
    pub new_session: bool,
    /// The bar extended the session range; every block was rebuilt
    pub redrawn: bool,
    /// Blocks added by this bar (all blocks after a redraw)
    pub blocks: Vec<TpoBlock>,
}

#[derive(Debug, Clone)]
pub struct TpoSession {
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub start_bar: usize,
    pub end_bar: usize,
    tick_size: f64,
    box_ticks: i64,
    period_minutes: i64,
    high: i64,
    low: i64,
    aligned_low: i64,
    bars: Vec<TpoBar>,
    buckets: BTreeMap<i64, AHashSet<i64>>,
    blocks: Vec<TpoBlock>,
    value_area: Option<ValueArea>,
}

impl TpoSession {
    fn new(bar: &Bar, tick_size: f64, box_ticks: i64, period_minutes: i64) -> Self {
        let (high, low) = bar_ticks(bar, tick_size);
        Self {
            date: bar.session_date,
            start_time: bar.open_time,
            start_bar: bar.index,
            end_bar: bar.index,
            tick_size,
            box_ticks,
            period_minutes,
            high,
            low,
            aligned_low: low.div_euclid(box_ticks) * box_ticks,
            bars: Vec::new(),
            buckets: BTreeMap::new(),
            blocks: Vec::new(),
            value_area: None,
        }
    }

    fn period_of(&self, time: NaiveDateTime) -> i64 {
        (time - self.start_time).num_minutes().div_euclid(self.period_minutes)
    }

    fn bucket_of(&self, ticks: i64) -> i64 {
        (ticks - self.aligned_low).div_euclid(self.box_ticks)
    }

    /// Record one bar's touches; returns the blocks it created.
    fn touch(&mut self, bar: TpoBar) -> Vec<TpoBlock> {
        let mut created = Vec::new();
        for bucket in self.bucket_of(bar.low)..=self.bucket_of(bar.high) {
            let periods = self.buckets.entry(bucket).or_default();
            let column = periods.len();
            if periods.insert(bar.period) {
                let block = TpoBlock { bucket, period: bar.period, column, letter: tpo_letter(column) };
                self.blocks.push(block);
                created.push(block);
            }
        }
        created
    }

    fn rebuild(&mut self) {
        self.aligned_low = self.low.div_euclid(self.box_ticks) * self.box_ticks;
        self.buckets.clear();
        self.blocks.clear();
        let bars = std::mem::take(&mut self.bars);
        for b in &bars {
            self.touch(*b);
        }
        self.bars = bars;
    }

    fn add_bar(&mut self, bar: &Bar, pct: f64) -> TpoUpdate {
        let (high, low) = bar_ticks(bar, self.tick_size);
        let tb = TpoBar { high, low, period: self.period_of(bar.open_time) };
        self.end_bar = bar.index;
        self.bars.push(tb);

        let new_extreme = high > self.high || low < self.low;
        let update = if new_extreme {
            self.high = self.high.max(high);
            self.low = self.low.min(low);
            self.rebuild();
            debug!(date = %self.date, bars = self.bars.len(), "tpo session rebuilt on new extreme");
            TpoUpdate { new_session: false, redrawn: true, blocks: self.blocks.clone() }
        } else {
            TpoUpdate { new_session: false, redrawn: false, blocks: self.touch(tb) }
        };
        self.calculate_value_area(pct);
        update
    }

    pub fn calculate_value_area(&mut self, pct: f64) -> Option<ValueArea> {
        self.value_area = value_area(&self.counts(), pct);
        self.value_area
    }

    /// Bucket → number of distinct periods.
    pub fn counts(&self) -> BTreeMap<i64, f64> {
        self.buckets.iter().map(|(&b, p)| (b, p.len() as f64)).collect()
    }

    pub fn period_count(&self, bucket: i64) -> usize {
        self.buckets.get(&bucket).map_or(0, |p| p.len())
    }

    pub fn blocks(&self) -> &[TpoBlock] {
        &self.blocks
    }

    pub fn box_height(&self) -> f64 {
        self.box_ticks as f64 * self.tick_size
    }

    pub fn bucket_bottom(&self, bucket: i64) -> f64 {
        (self.aligned_low + bucket * self.box_ticks) as f64 * self.tick_size
    }

    pub fn bucket_mid(&self, bucket: i64) -> f64 {
        self.bucket_bottom(bucket) + self.box_height() / 2.0
    }

    pub fn high(&self) -> f64 {
        self.high as f64 * self.tick_size
    }

    pub fn low(&self) -> f64 {
        self.low as f64 * self.tick_size
    }

    pub fn value_area(&self) -> Option<&ValueArea> {
        self.value_area.as_ref()
    }

    pub fn poc(&self) -> Option<f64> {
        self.value_area.map(|va| self.bucket_mid(va.poc))
    }

    pub fn vah(&self) -> Option<f64> {
        self.value_area.map(|va| self.bucket_mid(va.vah))
    }

    pub fn val(&self) -> Option<f64> {
        self.value_area.map(|va| self.bucket_mid(va.val))
    }
}

fn bar_ticks(bar: &Bar, tick_size: f64) -> (i64, i64) {
    let h = price_to_ticks(bar.high, tick_size);
    let l = price_to_ticks(bar.low, tick_size);
    (h.max(l), h.min(l))
}

#[derive(Debug, Clone)]
pub struct TpoEngine {
    tick_size: f64,
    box_ticks: i64,
    period_minutes: i64,
    value_area_pct: f64,
    sessions: Vec<TpoSession>,
}

impl TpoEngine {
    pub fn new(tick_size: f64, box_height_ticks: usize, period_minutes: usize, value_area_pct: f64) -> Self {
        Self {
            tick_size,
            box_ticks: box_height_ticks.max(1) as i64,
            period_minutes: period_minutes.max(1) as i64,
            value_area_pct,
            sessions: Vec::new(),
        }
    }

    /// Fold a closed display bar into its session.
    pub fn on_bar_close(&mut self, bar: &Bar) -> TpoUpdate {
        if !(bar.high.is_finite() && bar.low.is_finite()) {
            return TpoUpdate::default();
        }
        let new_session = self.sessions.last().map_or(true, |s| s.date != bar.session_date);
        if new_session {
            if let Some(prev) = self.sessions.last() {
                debug!(date = %prev.date, poc = ?prev.poc(), "tpo session closed");
            }
            self.sessions.push(TpoSession::new(bar, self.tick_size, self.box_ticks, self.period_minutes));
        }

        let pct = self.value_area_pct;
        match self.sessions.last_mut() {
            Some(session) => {
                let mut update = session.add_bar(bar, pct);
                update.new_session = new_session;
                update
            }
            None => TpoUpdate::default(),
        }
    }

    pub fn recompute_value_areas(&mut self, pct: f64) {
        self.value_area_pct = pct;
        for s in &mut self.sessions {
            s.calculate_value_area(pct);
        }
    }

    pub fn sessions(&self) -> &[TpoSession] {
        &self.sessions
    }

    pub fn current(&self) -> Option<&TpoSession> {
        self.sessions.last()
    }
}
