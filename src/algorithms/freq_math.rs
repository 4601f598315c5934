//! Frequency target selection: grid-tier increases and threshold decreases.

use crate::config::tunables::Tunables;

/// Load extrapolated to the maximum frequency, 0..=100. Used to pick the
/// grid tier for an increase.
pub fn scaled_load(cur_load: u32, cur_khz: u32, max_khz: u32) -> u32 {
    if max_khz == 0 {
        return 0;
    }
    ((cur_load as u64 * cur_khz as u64) / max_khz as u64) as u32
}

/// True when the load-frequency product crosses the up threshold for the
/// currently applied frequency.
pub fn should_increase(max_load_freq: u64, cur_khz: u32, up_threshold: u32) -> bool {
    max_load_freq > up_threshold as u64 * cur_khz as u64
}

/// Picks the increase target from the three-tier grid: fixed-step jumps
/// from the current frequency while extrapolated load is high, otherwise
/// the tunable optimal ceiling.
pub fn grid_increase_target(
    load_at_max: u32,
    cur_khz: u32,
    max_khz: u32,
    tunables: &Tunables,
) -> u32 {
    if load_at_max > tunables.high_grid_load {
        let step = (max_khz as u64 * tunables.high_grid_step as u64 / 100) as u32;
        max_khz.min(cur_khz.saturating_add(step))
    } else if load_at_max > tunables.middle_grid_load {
        let step = (max_khz as u64 * tunables.middle_grid_step as u64 / 100) as u32;
        max_khz.min(cur_khz.saturating_add(step))
    } else {
        max_khz.min(tunables.optimal_max_freq_khz)
    }
}

/// True when load has dropped far enough below the threshold band that a
/// lower frequency can sustain it.
pub fn should_decrease(max_load_freq: u64, cur_khz: u32, up_threshold: u32, down_diff: u32) -> bool {
    max_load_freq < (up_threshold - down_diff) as u64 * cur_khz as u64
}

/// The lowest frequency that can hold the observed load without tripping
/// the up policy again. Integer-truncating division, as the decrease
/// decision has always done it.
pub fn decrease_target(max_load_freq: u64, up_threshold: u32, down_diff: u32) -> u32 {
    (max_load_freq / (up_threshold - down_diff) as u64) as u32
}
