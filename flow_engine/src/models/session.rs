/// models/session.rs: When accumulators restart
///
/// A `SessionResetPolicy` is consulted once per closed bar and answers
/// whether the consumer must discard its running state on that bar.
///
///   NoReset  never
///   Session  the bar opens a new session (every such bar, even back to back)
///   Daily    the bar's trading day differs from the day of the last reset
///   Weekly   the bar's ISO week differs from the week of the last reset
///
/// The very first bar seen by a Daily or Weekly policy counts as a reset.
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, IsoWeek, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResetPeriod {
    NoReset,
    #[default]
    Session,
    Daily,
    Weekly,
}

impl FromStr for ResetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "noreset" | "none" | "never" => Ok(ResetPeriod::NoReset),
            "session"                    => Ok(ResetPeriod::Session),
            "daily" | "day"              => Ok(ResetPeriod::Daily),
            "weekly" | "week"            => Ok(ResetPeriod::Weekly),
            other => Err(format!("unknown reset period `{other}`")),
        }
    }
}

impl fmt::Display for ResetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResetPeriod::NoReset => "no-reset",
            ResetPeriod::Session => "session",
            ResetPeriod::Daily   => "daily",
            ResetPeriod::Weekly  => "weekly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionResetPolicy {
    period: ResetPeriod,
    last_reset: Option<NaiveDate>,
}

impl SessionResetPolicy {
    pub fn new(period: ResetPeriod) -> Self {
        Self { period, last_reset: None }
    }

    pub fn period(&self) -> ResetPeriod {
        self.period
    }

    /// Trading day of the most recent reset, if any.
    pub fn last_reset(&self) -> Option<NaiveDate> {
        self.last_reset
    }

    /// Decide for `bar` and record the reset when it happens.
    pub fn should_reset(&mut self, bar: &Bar) -> bool {
        let reset = match self.period {
            ResetPeriod::NoReset => false,
            ResetPeriod::Session => bar.is_first_of_session,
            ResetPeriod::Daily => self.last_reset != Some(bar.session_date),
            ResetPeriod::Weekly => {
                self.last_reset.map(iso_week) != Some(iso_week(bar.session_date))
            }
        };
        if reset {
            self.last_reset = Some(bar.session_date);
        }
        reset
    }

    pub fn clear(&mut self) {
        self.last_reset = None;
    }
}

fn iso_week(date: NaiveDate) -> IsoWeek {
    date.iso_week()
}
