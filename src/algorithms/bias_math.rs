//! Powersave-bias frequency averaging.
//!
//! With a nonzero bias the governor does not jump straight to the requested
//! frequency. The request is reduced by `bias/1000`, the reduced target is
//! bracketed between the two nearest table frequencies, and one sampling
//! interval is time-split between the brackets so the average frequency
//! over the interval approximates the reduced target.

use crate::hal::{FrequencyTable, Rounding};

pub const POWERSAVE_BIAS_MAXLEVEL: i32 = 1000;
pub const POWERSAVE_BIAS_MINLEVEL: i32 = -1000;

/// A two-frequency time split within one sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiasSplit {
    pub freq_hi_khz: u32,
    pub freq_lo_khz: u32,
    pub hi_us: u64,
    pub lo_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasOutcome {
    /// No viable bracket; set this frequency directly.
    Direct(u32),
    /// Run `freq_hi` for `hi_us`, then `freq_lo` for `lo_us`.
    Split(BiasSplit),
}

/// Computes the bias-reduced target and its bracket split.
///
/// `request_khz` is snapped to the table with the caller's rounding first,
/// exactly like a direct transition would be.
pub fn bias_target(
    table: &FrequencyTable,
    request_khz: u32,
    relation: Rounding,
    bias_permille: i32,
    interval_us: u64,
) -> BiasOutcome {
    let freq_req = table.target(request_khz, relation);
    // Signed on purpose: a negative bias raises the average target above
    // the request (boost), clamped back onto the table below.
    let reduction = freq_req as i64 * bias_permille as i64 / 1000;
    let freq_avg = u32::try_from(freq_req as i64 - reduction).unwrap_or(0);

    let freq_lo = table.target(freq_avg, Rounding::AtOrBelow);
    let freq_hi = table.target(freq_avg, Rounding::AtOrAbove);
    if freq_hi == freq_lo {
        return BiasOutcome::Direct(freq_lo);
    }

    let span = (freq_hi - freq_lo) as u64;
    let mut hi_us = (freq_avg - freq_lo) as u64 * interval_us;
    hi_us += span / 2;
    hi_us /= span;
    let lo_us = interval_us - hi_us;
    BiasOutcome::Split(BiasSplit {
        freq_hi_khz: freq_hi,
        freq_lo_khz: freq_lo,
        hi_us,
        lo_us,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FrequencyTable {
        FrequencyTable::new(vec![
            300_000, 600_000, 1_000_000, 1_400_000, 1_600_000, 1_800_000,
        ])
    }

    #[test]
    fn split_always_sums_to_the_interval() {
        let t = table();
        for bias in [1, 100, 250, 500, 750, 999] {
            for req in [600_000, 1_000_000, 1_400_000, 1_800_000] {
                match bias_target(&t, req, Rounding::AtOrBelow, bias, 50_000) {
                    BiasOutcome::Split(s) => {
                        assert_eq!(s.hi_us + s.lo_us, 50_000, "bias={bias} req={req}");
                        assert!(s.freq_lo_khz < s.freq_hi_khz);
                    }
                    BiasOutcome::Direct(f) => {
                        assert!(t.contains(f), "bias={bias} req={req}");
                    }
                }
            }
        }
    }

    #[test]
    fn half_bias_between_adjacent_steps() {
        // 50% bias off 1.8 GHz lands at 900 MHz, bracketed by 600M/1000M:
        // hi share = (900-600)/(1000-600) = 3/4 of the interval.
        let out = bias_target(&table(), 1_800_000, Rounding::AtOrBelow, 500, 50_000);
        let s = match out {
            BiasOutcome::Split(s) => s,
            BiasOutcome::Direct(f) => panic!("expected split, got {f}"),
        };
        assert_eq!(s.freq_lo_khz, 600_000);
        assert_eq!(s.freq_hi_khz, 1_000_000);
        assert_eq!(s.hi_us, 37_500);
        assert_eq!(s.lo_us, 12_500);
    }

    #[test]
    fn split_weights_the_brackets_proportionally() {
        // Reduced target 1.7 GHz sits exactly between the 1.6/1.8 steps.
        let t = FrequencyTable::new(vec![1_600_000, 1_800_000]);
        let out = bias_target(&t, 1_800_000, Rounding::AtOrBelow, 56, 50_000);
        // 1_800_000 - 1_800_000*56/1000 = 1_699_200.
        let s = match out {
            BiasOutcome::Split(s) => s,
            BiasOutcome::Direct(f) => panic!("expected split, got {f}"),
        };
        assert_eq!(s.hi_us + s.lo_us, 50_000);
        // (99_200 * 50_000 + 100_000) / 200_000, truncated.
        assert_eq!(s.hi_us, 24_800);
    }

    #[test]
    fn negative_bias_boosts_above_the_request() {
        // -500 off 1.0 GHz targets 1.5 GHz, bracketed by 1.4/1.6 steps.
        let out = bias_target(&table(), 1_000_000, Rounding::AtOrBelow, -500, 50_000);
        let s = match out {
            BiasOutcome::Split(s) => s,
            BiasOutcome::Direct(f) => panic!("expected split, got {f}"),
        };
        assert_eq!(s.freq_lo_khz, 1_400_000);
        assert_eq!(s.freq_hi_khz, 1_600_000);
        assert_eq!(s.hi_us, 25_000);
    }

    #[test]
    fn boost_beyond_table_ceiling_clamps_to_highest() {
        let out = bias_target(&table(), 1_800_000, Rounding::AtOrBelow, -999, 50_000);
        assert_eq!(out, BiasOutcome::Direct(1_800_000));
    }

    #[test]
    fn degenerate_bracket_sets_directly() {
        // Zero reduction snaps onto a table entry: no split.
        let out = bias_target(&table(), 1_000_000, Rounding::AtOrBelow, 0, 50_000);
        assert_eq!(out, BiasOutcome::Direct(1_000_000));
    }

    #[test]
    fn reduction_below_table_floor_clamps_to_lowest() {
        let out = bias_target(&table(), 300_000, Rounding::AtOrBelow, 999, 50_000);
        assert_eq!(out, BiasOutcome::Direct(300_000));
    }
}
