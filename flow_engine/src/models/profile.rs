/// models/profile.rs: Price grid and value-area expansion shared by the
/// volume profile and TPO engines
///
/// ─────────────────────────────────────────────────────────────────────────
/// VALUE AREA (greedy nearest expansion)
/// ─────────────────────────────────────────────────────────────────────────
///
///   1. POC = level with the largest count (lowest level on ties).
///   2. Span = [POC, POC], acc = count(POC).
///   3. While acc < pct · total:
///        compare the level immediately above the span with the level
///        immediately below it (an empty level counts 0), take the larger
///        (ties go up), stop once the span covers every populated level.
///   4. VAH / VAL = top / bottom level of the span.
///
/// This is the conventional market-profile construction.  It is not the
/// narrowest range that reaches pct of the total.
/// ─────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Integer tick index of `price` on a grid of `tick_size`.
pub fn price_to_ticks(price: f64, tick_size: f64) -> i64 {
    (price / tick_size).round() as i64
}

pub fn ticks_to_price(ticks: i64, tick_size: f64) -> f64 {
    ticks as f64 * tick_size
}

/// Result of a value-area computation, expressed in level keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueArea {
    pub poc: i64,
    pub vah: i64,
    pub val: i64,
    /// Count at the POC level
    pub poc_count: f64,
    /// Count captured inside [val, vah]
    pub area_count: f64,
    pub total: f64,
}

/// Greedy value area over `levels` (level key → count).
///
/// `None` when the profile is empty or carries no positive count.
pub fn value_area(levels: &BTreeMap<i64, f64>, pct: f64) -> Option<ValueArea> {
    let total: f64 = levels.values().sum();
    if levels.is_empty() || total <= 0.0 {
        return None;
    }

    let mut poc = i64::MIN;
    let mut poc_count = f64::NEG_INFINITY;
    for (&level, &count) in levels {
        if count > poc_count {
            poc = level;
            poc_count = count;
        }
    }

    let target = pct.clamp(0.0, 1.0) * total;
    let (mut lo, mut hi) = (poc, poc);
    let mut acc = poc_count;

    let (first, last) = match (levels.keys().next(), levels.keys().next_back()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return None,
    };
    let count = |k: i64| levels.get(&k).copied().unwrap_or(0.0);

    while acc < target {
        let above = (hi < last).then(|| count(hi + 1));
        let below = (lo > first).then(|| count(lo - 1));
        match (above, below) {
            (None, None) => break,
            (Some(va), Some(vb)) if vb > va => {
                lo -= 1;
                acc += vb;
            }
            (Some(va), _) => {
                hi += 1;
                acc += va;
            }
            (None, Some(vb)) => {
                lo -= 1;
                acc += vb;
            }
        }
    }

    Some(ValueArea { poc, vah: hi, val: lo, poc_count, area_count: acc, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(pairs: &[(i64, f64)]) -> BTreeMap<i64, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn poc_is_max_level() {
        let l = levels(&[(1, 5.0), (2, 20.0), (3, 10.0)]);
        let va = value_area(&l, 0.7).unwrap();
        assert_eq!(va.poc, 2);
        assert_eq!(va.poc_count, 20.0);
    }

    #[test]
    fn expansion_prefers_larger_neighbour() {
        // total 100, target 70: POC 40 at 3, then 25 below, then 10 above
        let l = levels(&[(1, 5.0), (2, 25.0), (3, 40.0), (4, 10.0), (5, 20.0)]);
        let va = value_area(&l, 0.7).unwrap();
        assert_eq!((va.val, va.poc, va.vah), (2, 3, 4));
        assert!(va.area_count >= 70.0);
    }

    #[test]
    fn ties_expand_upward() {
        let l = levels(&[(1, 10.0), (2, 30.0), (3, 10.0)]);
        let va = value_area(&l, 0.7).unwrap();
        assert_eq!((va.val, va.vah), (2, 3));
    }

    #[test]
    fn gap_counts_as_empty_neighbour() {
        // Level 2 is empty: the populated level below beats it
        let l = levels(&[(0, 2.0), (1, 4.0), (3, 3.0)]);
        let va = value_area(&l, 0.7).unwrap();
        assert_eq!((va.val, va.poc, va.vah), (0, 1, 3));
        assert_eq!(va.area_count, 9.0);

        // Empty neighbours on both sides tie, so the span walks up the gap
        let l = levels(&[(-5, 20.0), (10, 50.0), (40, 30.0)]);
        let va = value_area(&l, 0.8).unwrap();
        assert_eq!((va.val, va.poc, va.vah), (10, 10, 40));
        assert_eq!(va.area_count, 80.0);
    }

    #[test]
    fn area_invariant_holds() {
        let counts = [3.0, 7.0, 1.0, 9.0, 9.0, 2.0, 0.5, 4.0, 8.0, 6.0];
        let l: BTreeMap<i64, f64> = counts.iter().enumerate().map(|(i, &c)| (i as i64, c)).collect();
        for pct in [0.1, 0.5, 0.7, 0.9, 1.0] {
            let va = value_area(&l, pct).unwrap();
            let inside: f64 = l.range(va.val..=va.vah).map(|(_, v)| v).sum();
            assert!(inside >= pct * va.total - 1e-9, "pct {pct}: {inside}");
            assert!(va.val <= va.poc && va.poc <= va.vah);
        }
    }

    #[test]
    fn empty_profile_has_no_value_area() {
        assert!(value_area(&BTreeMap::new(), 0.7).is_none());
        assert!(value_area(&levels(&[(1, 0.0)]), 0.7).is_none());
    }

    #[test]
    fn tick_grid() {
        assert_eq!(price_to_ticks(4500.25, 0.25), 18001);
        assert_eq!(price_to_ticks(-1.0, 0.5), -2);
        assert!((ticks_to_price(18001, 0.25) - 4500.25).abs() < 1e-9);
    }
}
