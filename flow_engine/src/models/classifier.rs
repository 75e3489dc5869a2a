/// models/classifier.rs: Trade side attribution
///
/// ─────────────────────────────────────────────────────────────────────────
/// TWO POLICIES
/// ─────────────────────────────────────────────────────────────────────────
///
/// QUOTE MIDPOINT (Lee-Ready)
///   mid = (bid + ask) / 2
///   price > mid → Buy,  price < mid → Sell
///   price = mid → tick rule against the previous trade:
///                 up-tick → Buy, down-tick → Sell, else Split
///   bid ≤ 0, ask ≤ 0 or ask ≤ bid → Split (unclassifiable quote)
///
/// BID/ASK THRESHOLD
///   price ≥ ask → Buy,  price ≤ bid → Sell,  otherwise Split
///
/// A Split trade contributes half its volume to each side.  This is the
/// attribution policy for ambiguous prints, not a fallback error path.
/// ─────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
    /// Ambiguous or unclassified; volume is divided 50/50
    Split,
}

impl TradeSide {
    /// (buy, sell) volume attributed to this side.
    pub fn attribute(self, volume: f64) -> (f64, f64) {
        match self {
            TradeSide::Buy   => (volume, 0.0),
            TradeSide::Sell  => (0.0, volume),
            TradeSide::Split => (volume * 0.5, volume * 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassificationMethod {
    /// Quote midpoint with tick-rule tiebreak
    #[default]
    LeeReady,
    /// Direct comparison against the touch
    BidAsk,
}

impl FromStr for ClassificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "leeready" | "midpoint" => Ok(ClassificationMethod::LeeReady),
            "bidask" | "quote"      => Ok(ClassificationMethod::BidAsk),
            other => Err(format!("unknown classification method `{other}`")),
        }
    }
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMethod::LeeReady => f.write_str("lee-ready"),
            ClassificationMethod::BidAsk   => f.write_str("bid-ask"),
        }
    }
}

/// Quote-midpoint classification with tick-rule tiebreak.
///
/// `last_trade_price` ≤ 0 means "no previous trade".
pub fn classify_lee_ready(price: f64, bid: f64, ask: f64, last_trade_price: f64) -> TradeSide {
    if bid <= 0.0 || ask <= 0.0 || ask <= bid {
        return TradeSide::Split;
    }
    let mid = (bid + ask) / 2.0;
    if price > mid {
        TradeSide::Buy
    } else if price < mid {
        TradeSide::Sell
    } else if last_trade_price > 0.0 && price > last_trade_price {
        TradeSide::Buy
    } else if last_trade_price > 0.0 && price < last_trade_price {
        TradeSide::Sell
    } else {
        TradeSide::Split
    }
}

/// Touch-threshold classification.  An unusable quote gives Split.
pub fn classify_bid_ask(price: f64, bid: f64, ask: f64) -> TradeSide {
    if bid <= 0.0 || ask <= 0.0 || ask <= bid {
        return TradeSide::Split;
    }
    if price >= ask {
        TradeSide::Buy
    } else if price <= bid {
        TradeSide::Sell
    } else {
        TradeSide::Split
    }
}

/// Stateful wrapper that remembers the last trade price for the tick rule.
#[derive(Debug, Clone, Default)]
pub struct TradeClassifier {
    method: ClassificationMethod,
    last_trade_price: f64,
}

impl TradeClassifier {
    pub fn new(method: ClassificationMethod) -> Self {
        Self { method, last_trade_price: 0.0 }
    }

    pub fn method(&self) -> ClassificationMethod {
        self.method
    }

    pub fn last_trade_price(&self) -> Option<f64> {
        (self.last_trade_price > 0.0).then_some(self.last_trade_price)
    }

    /// Classify a print and remember its price.
    pub fn classify(&mut self, price: f64, bid: f64, ask: f64) -> TradeSide {
        let side = match self.method {
            ClassificationMethod::LeeReady => {
                classify_lee_ready(price, bid, ask, self.last_trade_price)
            }
            ClassificationMethod::BidAsk => classify_bid_ask(price, bid, ask),
        };
        self.last_trade_price = price;
        side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lee_ready_quote_rule() {
        assert_eq!(classify_lee_ready(101.5, 100.0, 102.0, 0.0), TradeSide::Buy);
        assert_eq!(classify_lee_ready(100.5, 100.0, 102.0, 0.0), TradeSide::Sell);
    }

    #[test]
    fn lee_ready_tick_rule_at_mid() {
        assert_eq!(classify_lee_ready(101.0, 100.0, 102.0, 100.5), TradeSide::Buy);
        assert_eq!(classify_lee_ready(101.0, 100.0, 102.0, 101.5), TradeSide::Sell);
        assert_eq!(classify_lee_ready(101.0, 100.0, 102.0, 101.0), TradeSide::Split);
        assert_eq!(classify_lee_ready(101.0, 100.0, 102.0, 0.0), TradeSide::Split);
    }

    #[test]
    fn lee_ready_bad_quotes_are_split() {
        assert_eq!(classify_lee_ready(101.0, 0.0, 102.0, 100.0), TradeSide::Split);
        assert_eq!(classify_lee_ready(101.0, 102.0, 102.0, 100.0), TradeSide::Split);
        assert_eq!(classify_lee_ready(101.0, 103.0, 102.0, 100.0), TradeSide::Split);
    }

    #[test]
    fn bid_ask_threshold() {
        // Inside the spread: split 50/50
        assert_eq!(classify_bid_ask(101.0, 100.0, 102.0), TradeSide::Split);
        assert_eq!(classify_bid_ask(102.0, 100.0, 102.0), TradeSide::Buy);
        assert_eq!(classify_bid_ask(99.0, 100.0, 102.0), TradeSide::Sell);
        // 99 sits inside (98, 100)
        assert_eq!(classify_bid_ask(99.0, 98.0, 100.0), TradeSide::Split);
    }

    #[test]
    fn split_halves_volume() {
        assert_eq!(TradeSide::Split.attribute(10.0), (5.0, 5.0));
        assert_eq!(TradeSide::Buy.attribute(10.0), (10.0, 0.0));
        assert_eq!(TradeSide::Sell.attribute(10.0), (0.0, 10.0));
    }

    #[test]
    fn classifier_tracks_last_price() {
        let mut c = TradeClassifier::new(ClassificationMethod::LeeReady);
        assert!(c.last_trade_price().is_none());
        assert_eq!(c.classify(100.5, 100.0, 101.0), TradeSide::Split);
        // At the new mid, up-tick from 100.5
        assert_eq!(c.classify(100.75, 100.5, 101.0), TradeSide::Buy);
        assert_eq!(c.last_trade_price(), Some(100.75));
    }

    #[test]
    fn parse_method() {
        assert_eq!("lee-ready".parse::<ClassificationMethod>().unwrap(), ClassificationMethod::LeeReady);
        assert_eq!("BID_ASK".parse::<ClassificationMethod>().unwrap(), ClassificationMethod::BidAsk);
    }
}
