/// data.rs: Market data delivered by the host
///
/// The host owns both streams; the engine only reads these values.
/// Ordering contract: all ticks of a bar arrive before that bar's close,
/// and timestamps never decrease.
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single trade print with the quote in force when it printed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Trade price
    pub price: f64,
    /// Best bid at trade time (0 when unknown)
    pub bid: f64,
    /// Best ask at trade time (0 when unknown)
    pub ask: f64,
    /// Trade size
    pub volume: f64,
    pub time: NaiveDateTime,
}

impl Tick {
    pub fn has_valid_quote(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.ask > self.bid
    }
}

/// A completed display bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Host bar index, strictly increasing
    pub index: usize,
    pub open_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_first_of_session: bool,
    pub is_last_of_session: bool,
    /// Trading day the bar belongs to (may differ from the calendar date of
    /// `open_time` for overnight sessions)
    pub session_date: NaiveDate,
}

// ── PRICE SOURCE ─────────────────────────────────────────────────────────

/// Which bar price feeds the VWAP/TWAP family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceSource {
    Close,
    #[default]
    Hlc3,
    Hl2,
    Ohlc4,
    Hlcc4,
}

impl PriceSource {
    pub fn price(self, bar: &Bar) -> f64 {
        match self {
            PriceSource::Close => bar.close,
            PriceSource::Hlc3  => (bar.high + bar.low + bar.close) / 3.0,
            PriceSource::Hl2   => (bar.high + bar.low) / 2.0,
            PriceSource::Ohlc4 => (bar.open + bar.high + bar.low + bar.close) / 4.0,
            PriceSource::Hlcc4 => (bar.high + bar.low + bar.close + bar.close) / 4.0,
        }
    }

    /// Infer the intended source from where an anchor was dropped on a bar.
    ///
    /// Within one tick of the close → Close; within one tick of the high or
    /// low → HL2; anywhere else → HLC3.
    pub fn detect(anchor_price: f64, bar: &Bar, tick_size: f64) -> Self {
        if (anchor_price - bar.close).abs() < tick_size {
            PriceSource::Close
        } else if (anchor_price - bar.low).abs() < tick_size
            || (anchor_price - bar.high).abs() < tick_size
        {
            PriceSource::Hl2
        } else {
            PriceSource::Hlc3
        }
    }
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(PriceSource::Close),
            "hlc3"  => Ok(PriceSource::Hlc3),
            "hl2"   => Ok(PriceSource::Hl2),
            "ohlc4" => Ok(PriceSource::Ohlc4),
            "hlcc4" => Ok(PriceSource::Hlcc4),
            other   => Err(format!("unknown price source `{other}`")),
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceSource::Close => "close",
            PriceSource::Hlc3  => "hlc3",
            PriceSource::Hl2   => "hl2",
            PriceSource::Ohlc4 => "ohlc4",
            PriceSource::Hlcc4 => "hlcc4",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    pub fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    /// Bar helper: OHLC, volume, open time, first-of-session flag.
    pub fn bar(index: usize, time: NaiveDateTime, ohlc: [f64; 4], volume: f64, first: bool) -> Bar {
        Bar {
            index,
            open_time: time,
            open: ohlc[0],
            high: ohlc[1],
            low: ohlc[2],
            close: ohlc[3],
            volume,
            is_first_of_session: first,
            is_last_of_session: false,
            session_date: time.date(),
        }
    }

    pub fn tick(price: f64, bid: f64, ask: f64, volume: f64, time: NaiveDateTime) -> Tick {
        Tick { price, bid, ask, volume, time }
    }
}
