//! Hardware accessor seam. Everything platform-specific stays behind
//! [`CpufreqHal`]; the decision engine never touches sysfs directly.

pub mod filesystem;
pub mod sysfs;

use crate::algorithms::load_math::CpuTimes;
use crate::daemon::types::GovError;

/// Rounding direction when a requested frequency is snapped to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Lowest supported frequency at or above the target.
    AtOrAbove,
    /// Highest supported frequency at or below the target.
    AtOrBelow,
}

/// Supported frequencies of one CPU, ascending, immutable after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    entries_khz: Vec<u32>,
}

impl FrequencyTable {
    pub fn new(mut entries_khz: Vec<u32>) -> Self {
        entries_khz.sort_unstable();
        entries_khz.dedup();
        Self { entries_khz }
    }

    pub fn is_empty(&self) -> bool {
        self.entries_khz.is_empty()
    }

    pub fn contains(&self, khz: u32) -> bool {
        self.entries_khz.binary_search(&khz).is_ok()
    }

    /// Snaps a target onto the table. Targets beyond either end clamp to
    /// the nearest endpoint.
    pub fn target(&self, khz: u32, relation: Rounding) -> u32 {
        debug_assert!(!self.entries_khz.is_empty());
        match relation {
            Rounding::AtOrAbove => match self.entries_khz.iter().find(|&&f| f >= khz) {
                Some(&f) => f,
                None => *self.entries_khz.last().unwrap_or(&khz),
            },
            Rounding::AtOrBelow => match self.entries_khz.iter().rev().find(|&&f| f <= khz) {
                Some(&f) => f,
                None => *self.entries_khz.first().unwrap_or(&khz),
            },
        }
    }
}

/// Platform contract consumed by the governor.
///
/// Any `Err` aborts the current sampling cycle; the per-CPU baselines are
/// only committed from successfully observed counters, so the next cycle
/// recomputes from the last good observation.
pub trait CpufreqHal {
    /// Cumulative idle/wall/nice counters for one CPU. With
    /// `exclude_iowait`, time spent waiting on disk I/O counts as busy.
    fn read_idle_wall_nice(&mut self, cpu: u32, exclude_iowait: bool)
        -> Result<CpuTimes, GovError>;

    /// Average frequency observed over the last interval, if the driver
    /// tracks one. `None` makes the engine fall back to the current
    /// frequency.
    fn read_current_avg_freq(&mut self, cpu: u32) -> Option<u32>;

    /// Requests a transition and returns the frequency actually applied
    /// after table snapping and policy clamping.
    fn apply_frequency(&mut self, target_khz: u32, relation: Rounding) -> Result<u32, GovError>;

    /// The discovered frequency table, absent on drivers that do not
    /// publish one. Without a table, powersave-bias averaging degrades to
    /// direct frequency application.
    fn frequency_table(&self) -> Option<&FrequencyTable>;
}
