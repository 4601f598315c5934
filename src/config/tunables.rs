//! Governor tunables. A snapshot is injected into every sampling cycle;
//! changing a value takes effect on the next cycle, never mid-cycle.

use crate::algorithms::bias_math::{POWERSAVE_BIAS_MAXLEVEL, POWERSAVE_BIAS_MINLEVEL};
use crate::daemon::types::GovError;

pub const DEF_FREQUENCY_UP_THRESHOLD: u32 = 70;
pub const DEF_FREQUENCY_DOWN_DIFFERENTIAL: u32 = 10;
pub const DEF_DOWN_DIFFERENTIAL_MULTI_CORE: u32 = 3;
pub const DEF_SAMPLING_DOWN_FACTOR: u32 = 1;
pub const DEF_SAMPLING_RATE_US: u64 = 50_000;

pub const DEF_MIDDLE_GRID_STEP: u32 = 14;
pub const DEF_HIGH_GRID_STEP: u32 = 20;
pub const DEF_MIDDLE_GRID_LOAD: u32 = 65;
pub const DEF_HIGH_GRID_LOAD: u32 = 89;

pub const DEF_SYNC_FREQUENCY_KHZ: u32 = 1_728_000;
pub const DEF_OPTIMAL_FREQUENCY_KHZ: u32 = 1_574_400;
pub const DEF_OPTIMAL_MAX_FREQ_KHZ: u32 = 1_728_000;

pub const MIN_FREQUENCY_UP_THRESHOLD: u32 = 11;
pub const MAX_FREQUENCY_UP_THRESHOLD: u32 = 100;
pub const MIN_FREQUENCY_DOWN_DIFFERENTIAL: u32 = 1;
pub const MAX_SAMPLING_DOWN_FACTOR: u32 = 3;

// Threshold intended for kernels with idle micro-accounting. Tick-based
// /proc/stat never offers that, so this stays a documented constant.
pub const MICRO_FREQUENCY_UP_THRESHOLD: u32 = 95;

/// Sampling-rate floors derived from the platform transition latency, µs.
pub const LATENCY_MULTIPLIER: u64 = 1000;
pub const MIN_LATENCY_MULTIPLIER: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    pub sampling_rate_us: u64,
    pub up_threshold: u32,
    pub down_differential: u32,
    pub down_differential_multi_core: u32,
    pub sampling_down_factor: u32,
    pub ignore_nice: bool,
    pub io_is_busy: bool,
    /// Per-mille bias toward lower power; the ±1000 extremes pin the domain
    /// to its minimum/maximum frequency and suspend sampling entirely.
    pub powersave_bias: i32,
    pub sync_freq_khz: u32,
    pub optimal_freq_khz: u32,
    pub optimal_max_freq_khz: u32,
    pub middle_grid_load: u32,
    pub middle_grid_step: u32,
    pub high_grid_load: u32,
    pub high_grid_step: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sampling_rate_us: DEF_SAMPLING_RATE_US,
            up_threshold: DEF_FREQUENCY_UP_THRESHOLD,
            down_differential: DEF_FREQUENCY_DOWN_DIFFERENTIAL,
            down_differential_multi_core: DEF_DOWN_DIFFERENTIAL_MULTI_CORE,
            sampling_down_factor: DEF_SAMPLING_DOWN_FACTOR,
            ignore_nice: false,
            io_is_busy: false,
            powersave_bias: 0,
            sync_freq_khz: DEF_SYNC_FREQUENCY_KHZ,
            optimal_freq_khz: DEF_OPTIMAL_FREQUENCY_KHZ,
            optimal_max_freq_khz: DEF_OPTIMAL_MAX_FREQ_KHZ,
            middle_grid_load: DEF_MIDDLE_GRID_LOAD,
            middle_grid_step: DEF_MIDDLE_GRID_STEP,
            high_grid_load: DEF_HIGH_GRID_LOAD,
            high_grid_step: DEF_HIGH_GRID_STEP,
        }
    }
}

impl Tunables {
    /// Range checks at the configuration boundary. Invalid values never
    /// reach the sampling engine.
    pub fn validate(&self) -> Result<(), GovError> {
        if self.up_threshold < MIN_FREQUENCY_UP_THRESHOLD
            || self.up_threshold > MAX_FREQUENCY_UP_THRESHOLD
        {
            return Err(GovError::InvalidInput(format!(
                "up_threshold {} outside {MIN_FREQUENCY_UP_THRESHOLD}..={MAX_FREQUENCY_UP_THRESHOLD}",
                self.up_threshold
            )));
        }
        if self.down_differential < MIN_FREQUENCY_DOWN_DIFFERENTIAL
            || self.down_differential >= self.up_threshold
        {
            return Err(GovError::InvalidInput(format!(
                "down_differential {} must be in {MIN_FREQUENCY_DOWN_DIFFERENTIAL}..up_threshold",
                self.down_differential
            )));
        }
        if self.down_differential_multi_core >= self.up_threshold {
            return Err(GovError::InvalidInput(format!(
                "down_differential_multi_core {} must stay below up_threshold",
                self.down_differential_multi_core
            )));
        }
        if self.sampling_down_factor < 1 || self.sampling_down_factor > MAX_SAMPLING_DOWN_FACTOR {
            return Err(GovError::InvalidInput(format!(
                "sampling_down_factor {} outside 1..={MAX_SAMPLING_DOWN_FACTOR}",
                self.sampling_down_factor
            )));
        }
        if self.powersave_bias < POWERSAVE_BIAS_MINLEVEL
            || self.powersave_bias > POWERSAVE_BIAS_MAXLEVEL
        {
            return Err(GovError::InvalidInput(format!(
                "powersave_bias {} outside {POWERSAVE_BIAS_MINLEVEL}..={POWERSAVE_BIAS_MAXLEVEL}",
                self.powersave_bias
            )));
        }
        if self.middle_grid_load > 100 || self.high_grid_load > 100 {
            return Err(GovError::InvalidInput(
                "grid loads are percentages and must be <= 100".to_string(),
            ));
        }
        if self.sampling_rate_us == 0 {
            return Err(GovError::InvalidInput("sampling_rate_us must be nonzero".to_string()));
        }
        Ok(())
    }

    /// Brings the sampling rate and the platform transition latency
    /// together: slow hardware forces a slower sampling loop.
    pub fn floor_sampling_rate(&mut self, transition_latency_ns: u64) {
        let mut latency_us = transition_latency_ns / 1000;
        if latency_us == 0 {
            latency_us = 1;
        }
        let floor = MIN_LATENCY_MULTIPLIER * latency_us;
        if latency_us != 1 {
            self.sampling_rate_us = self.sampling_rate_us.max(latency_us * LATENCY_MULTIPLIER);
        }
        self.sampling_rate_us = self.sampling_rate_us.max(floor);
    }
}
