//! Per-CPU load computation over cumulative idle/wall/nice time counters.

/// Cumulative time counters for one CPU, in microseconds since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle_us: u64,
    pub wall_us: u64,
    pub nice_us: u64,
}

/// Deltas of one sampling window, already baseline-subtracted.
#[derive(Debug, Clone, Copy)]
pub struct WindowDeltas {
    pub wall_us: u64,
    pub idle_us: u64,
    pub nice_us: u64,
}

impl WindowDeltas {
    pub fn between(prev: CpuTimes, cur: CpuTimes) -> Self {
        Self {
            wall_us: cur.wall_us.wrapping_sub(prev.wall_us),
            idle_us: cur.idle_us.wrapping_sub(prev.idle_us),
            nice_us: cur.nice_us.wrapping_sub(prev.nice_us),
        }
    }
}

/// Computes the load of one sampling window, 0..=100.
///
/// `prev_load` carries the previous window's load and doubles as the
/// wake-from-idle flag: when the window is unusually long (the deferrable
/// timer did not fire while the CPU slept) the previous load is reused once
/// so a task that just woke up is not scored near-zero, then the carry is
/// destroyed so the next window recomputes for real.
///
/// Returns `None` when the sample is degenerate (`wall == 0` or
/// `wall < idle`) and must be skipped for this cycle.
pub fn compute_window_load(
    deltas: WindowDeltas,
    ignore_nice: bool,
    gap_threshold_us: u64,
    prev_load: &mut u32,
) -> Option<u32> {
    let mut idle_us = deltas.idle_us;
    if ignore_nice {
        // Nice time counts as idle for load purposes.
        idle_us = idle_us.saturating_add(deltas.nice_us);
    }
    if deltas.wall_us == 0 || deltas.wall_us < idle_us {
        return None;
    }
    if deltas.wall_us > gap_threshold_us && *prev_load != 0 {
        let cur = *prev_load;
        // Destructive copy: reuse exactly once per wake-up from idle.
        *prev_load = 0;
        Some(cur)
    } else {
        let cur = (100 * (deltas.wall_us - idle_us) / deltas.wall_us) as u32;
        *prev_load = cur;
        Some(cur)
    }
}

/// Seeds `prev_load` from cumulative counters at governor start, before any
/// window exists.
pub fn seed_load(times: CpuTimes) -> u32 {
    if times.wall_us == 0 || times.wall_us < times.idle_us {
        return 0;
    }
    (100 * (times.wall_us - times.idle_us) / times.wall_us) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(wall: u64, idle: u64) -> WindowDeltas {
        WindowDeltas {
            wall_us: wall,
            idle_us: idle,
            nice_us: 0,
        }
    }

    #[test]
    fn load_stays_in_percent_range() {
        let mut prev = 0;
        for (wall, idle) in [(50_000, 0), (50_000, 25_000), (50_000, 50_000), (1, 0)] {
            let load = compute_window_load(deltas(wall, idle), false, 100_000, &mut prev).unwrap();
            assert!(load <= 100, "load {load} out of range for wall={wall} idle={idle}");
        }
    }

    #[test]
    fn degenerate_windows_are_skipped() {
        let mut prev = 42;
        assert_eq!(compute_window_load(deltas(0, 0), false, 100_000, &mut prev), None);
        assert_eq!(compute_window_load(deltas(10, 20), false, 100_000, &mut prev), None);
        // A skipped window must not disturb the carried load.
        assert_eq!(prev, 42);
    }

    #[test]
    fn nice_time_counts_as_idle_when_ignored() {
        let mut prev = 0;
        let d = WindowDeltas {
            wall_us: 100_000,
            idle_us: 40_000,
            nice_us: 20_000,
        };
        assert_eq!(compute_window_load(d, false, 200_000, &mut prev), Some(60));
        assert_eq!(compute_window_load(d, true, 200_000, &mut prev), Some(40));
    }

    #[test]
    fn long_gap_reuses_previous_load_exactly_once() {
        let mut prev = 0;
        // Busy window establishes a load of 80.
        assert_eq!(
            compute_window_load(deltas(50_000, 10_000), false, 100_000, &mut prev),
            Some(80)
        );
        // Long idle gap: the stale 80 is carried forward, not the near-zero
        // load the window itself would produce.
        assert_eq!(
            compute_window_load(deltas(400_000, 399_000), false, 100_000, &mut prev),
            Some(80)
        );
        assert_eq!(prev, 0);
        // Second long window in a row must recompute even though the gap
        // condition still holds: the carry was destroyed above.
        assert_eq!(
            compute_window_load(deltas(400_000, 200_000), false, 100_000, &mut prev),
            Some(50)
        );
        assert_eq!(prev, 50);
    }

    #[test]
    fn seed_load_matches_cumulative_busy_share() {
        let t = CpuTimes {
            idle_us: 250_000,
            wall_us: 1_000_000,
            nice_us: 0,
        };
        assert_eq!(seed_load(t), 75);
        assert_eq!(seed_load(CpuTimes::default()), 0);
    }
}
