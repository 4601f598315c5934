//! Per-domain demand-based switching: load sampling, the raise/hold/lower
//! decision, and the powersave-bias two-phase tick.

use crate::algorithms::bias_math::{
    self, BiasOutcome, BiasSplit, POWERSAVE_BIAS_MAXLEVEL, POWERSAVE_BIAS_MINLEVEL,
};
use crate::algorithms::freq_math;
use crate::algorithms::load_math::{self, CpuTimes, WindowDeltas};
use crate::config::tunables::Tunables;
use crate::daemon::state::LoadBoard;
use crate::daemon::types::GovError;
use crate::hal::{CpufreqHal, Rounding};

use std::time::Duration;

/// The frequency plane the governor drives. Bounds come from discovery;
/// `cur_khz` only changes through [`CpufreqHal::apply_frequency`] results.
#[derive(Debug, Clone)]
pub struct PolicyDomain {
    pub id: u32,
    /// System CPU ids; the first entry is the policy CPU.
    pub cpus: Vec<u32>,
    pub cur_khz: u32,
    pub min_khz: u32,
    pub max_khz: u32,
}

/// Per-CPU sampling state, domain-local, alive while the governor runs.
#[derive(Debug, Clone, Copy, Default)]
struct CpuSlot {
    cpu: u32,
    baseline: CpuTimes,
    prev_load: u32,
    max_load: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    Normal,
    Sub,
}

pub struct DomainGovernor {
    domain: PolicyDomain,
    slots: Vec<CpuSlot>,
    rate_mult: u32,
    sample_kind: SampleKind,
    pending_sub: Option<BiasSplit>,
    /// More than one frequency domain exists on the system; gates the
    /// cross-domain sync heuristics.
    multi_domain: bool,
}

impl DomainGovernor {
    pub fn new(domain: PolicyDomain, multi_domain: bool) -> Self {
        let slots = domain
            .cpus
            .iter()
            .map(|&cpu| CpuSlot {
                cpu,
                ..CpuSlot::default()
            })
            .collect();
        Self {
            domain,
            slots,
            rate_mult: 1,
            sample_kind: SampleKind::Normal,
            pending_sub: None,
            multi_domain,
        }
    }

    pub fn domain(&self) -> &PolicyDomain {
        &self.domain
    }

    /// Seeds the per-CPU baselines and returns the delay until the first
    /// tick, or `None` when a powersave-bias extreme pins the domain and
    /// periodic sampling is unnecessary.
    pub fn start(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
    ) -> Result<Option<Duration>, GovError> {
        if tunables.powersave_bias >= POWERSAVE_BIAS_MAXLEVEL {
            let applied = hal.apply_frequency(self.domain.min_khz, Rounding::AtOrAbove)?;
            self.domain.cur_khz = applied;
            log::info!("policy{}: pinned to minimum {applied} kHz", self.domain.id);
            return Ok(None);
        }
        if tunables.powersave_bias <= POWERSAVE_BIAS_MINLEVEL {
            let applied = hal.apply_frequency(self.domain.max_khz, Rounding::AtOrBelow)?;
            self.domain.cur_khz = applied;
            log::info!("policy{}: pinned to maximum {applied} kHz", self.domain.id);
            return Ok(None);
        }
        for slot in &mut self.slots {
            let times = hal.read_idle_wall_nice(slot.cpu, tunables.io_is_busy)?;
            slot.baseline = times;
            slot.prev_load = load_math::seed_load(times);
            slot.max_load = 0;
        }
        self.rate_mult = 1;
        self.sample_kind = SampleKind::Normal;
        self.pending_sub = None;
        Ok(Some(Duration::from_micros(tunables.sampling_rate_us)))
    }

    /// One invocation of the scheduling driver. Returns the delay until
    /// the next tick.
    pub fn on_tick(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
        board: &LoadBoard,
    ) -> Result<Duration, GovError> {
        if self.sample_kind == SampleKind::Sub && tunables.powersave_bias != 0 {
            if let Some(split) = self.pending_sub {
                // Second half of the averaging pass: drop to the low
                // bracket for the remainder of the interval.
                let applied = hal.apply_frequency(split.freq_lo_khz, Rounding::AtOrBelow)?;
                self.domain.cur_khz = applied;
                self.sample_kind = SampleKind::Normal;
                return Ok(Duration::from_micros(split.lo_us));
            }
        }
        self.sample_kind = SampleKind::Normal;
        self.pending_sub = None;
        self.sample_and_decide(hal, tunables, board)?;
        if let Some(split) = self.pending_sub {
            self.sample_kind = SampleKind::Sub;
            Ok(Duration::from_micros(split.hi_us))
        } else {
            Ok(Duration::from_micros(
                tunables.sampling_rate_us * self.rate_mult as u64,
            ))
        }
    }

    /// Policy bounds changed. Re-clamps the running frequency and runs one
    /// decision cycle immediately against the new bounds.
    pub fn limits_changed(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
        board: &LoadBoard,
        min_khz: u32,
        max_khz: u32,
    ) -> Result<(), GovError> {
        self.domain.min_khz = min_khz;
        self.domain.max_khz = max_khz;
        let clamped = self.domain.cur_khz.clamp(min_khz, max_khz);
        let applied = hal.apply_frequency(clamped, Rounding::AtOrAbove)?;
        self.domain.cur_khz = applied;
        self.sample_and_decide(hal, tunables, board)
    }

    fn sample_and_decide(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
        board: &LoadBoard,
    ) -> Result<(), GovError> {
        let effective_interval_us = tunables.sampling_rate_us * self.rate_mult as u64;
        let gap_threshold_us = 2 * effective_interval_us;
        let policy_cpu = self.domain.cpus[0];

        // Read every counter before committing any baseline: a failed read
        // aborts the cycle with all per-CPU state intact.
        let mut observed = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            observed.push(hal.read_idle_wall_nice(slot.cpu, tunables.io_is_busy)?);
        }

        let mut max_load_freq: u64 = 0;
        let mut policy_load: u32 = 0;
        for (slot, &times) in self.slots.iter_mut().zip(&observed) {
            let deltas = WindowDeltas::between(slot.baseline, times);
            slot.baseline = times;
            let prior_prev = slot.prev_load;
            let Some(cur_load) = load_math::compute_window_load(
                deltas,
                tunables.ignore_nice,
                gap_threshold_us,
                &mut slot.prev_load,
            ) else {
                continue;
            };
            slot.max_load = cur_load.max(prior_prev);
            board.publish(slot.cpu, slot.max_load);
            if slot.cpu == policy_cpu {
                policy_load = cur_load;
            }
            let freq_avg = hal
                .read_current_avg_freq(slot.cpu)
                .unwrap_or(self.domain.cur_khz);
            max_load_freq = max_load_freq.max(cur_load as u64 * freq_avg as u64);
        }

        let max_load_other = board.max_outside(&self.domain.cpus);
        let load_at_max =
            freq_math::scaled_load(policy_load, self.domain.cur_khz, self.domain.max_khz);
        let cur = self.domain.cur_khz;

        if freq_math::should_increase(max_load_freq, cur, tunables.up_threshold) {
            let target =
                freq_math::grid_increase_target(load_at_max, cur, self.domain.max_khz, tunables);
            if cur < self.domain.max_khz {
                // Headed for max: sample less often while saturated.
                self.rate_mult = tunables.sampling_down_factor;
            }
            log::debug!(
                "policy{}: load_freq {max_load_freq} over threshold, raising to {target}",
                self.domain.id
            );
            return self.freq_increase(hal, tunables, target);
        }

        if self.multi_domain {
            if max_load_other > tunables.up_threshold {
                if cur < tunables.sync_freq_khz {
                    return self.freq_increase(hal, tunables, tunables.sync_freq_khz);
                }
                return Ok(());
            }
            if freq_math::should_increase(max_load_freq, cur, tunables.up_threshold)
                && cur < tunables.optimal_freq_khz
            {
                return self.freq_increase(hal, tunables, tunables.optimal_freq_khz);
            }
        }

        if cur == self.domain.min_khz {
            return Ok(());
        }
        if freq_math::should_decrease(
            max_load_freq,
            cur,
            tunables.up_threshold,
            tunables.down_differential,
        ) {
            let mut freq_next = freq_math::decrease_target(
                max_load_freq,
                tunables.up_threshold,
                tunables.down_differential,
            );
            // No longer fully busy.
            self.rate_mult = 1;
            freq_next = freq_next.max(self.domain.min_khz);
            if self.multi_domain {
                if max_load_other > tunables.up_threshold - tunables.down_differential
                    && freq_next < tunables.sync_freq_khz
                {
                    freq_next = tunables.sync_freq_khz;
                }
                let multi_core_band =
                    (tunables.up_threshold - tunables.down_differential_multi_core) as u64;
                if max_load_freq > multi_core_band * cur as u64
                    && freq_next < tunables.optimal_freq_khz
                {
                    freq_next = tunables.optimal_freq_khz;
                }
            }
            log::debug!(
                "policy{}: load_freq {max_load_freq} under band, lowering to {freq_next}",
                self.domain.id
            );
            let target = if tunables.powersave_bias != 0 {
                self.bias_resolve(hal, tunables, freq_next, Rounding::AtOrAbove)
            } else {
                freq_next
            };
            let applied = hal.apply_frequency(target, Rounding::AtOrAbove)?;
            self.domain.cur_khz = applied;
        }
        Ok(())
    }

    fn freq_increase(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
        freq_khz: u32,
    ) -> Result<(), GovError> {
        let (target, relation) = if tunables.powersave_bias != 0 {
            (
                self.bias_resolve(hal, tunables, freq_khz, Rounding::AtOrBelow),
                Rounding::AtOrAbove,
            )
        } else {
            if self.domain.cur_khz == self.domain.max_khz {
                return Ok(());
            }
            (freq_khz, Rounding::AtOrBelow)
        };
        let applied = hal.apply_frequency(target, relation)?;
        self.domain.cur_khz = applied;
        Ok(())
    }

    /// Bias-aware target resolution. Arms the sub-sample pass when a
    /// viable bracket exists; without a frequency table the bias degrades
    /// to direct application of the request.
    fn bias_resolve(
        &mut self,
        hal: &mut dyn CpufreqHal,
        tunables: &Tunables,
        request_khz: u32,
        relation: Rounding,
    ) -> u32 {
        let Some(table) = hal.frequency_table() else {
            self.pending_sub = None;
            return request_khz;
        };
        match bias_math::bias_target(
            table,
            request_khz,
            relation,
            tunables.powersave_bias,
            tunables.sampling_rate_us,
        ) {
            BiasOutcome::Direct(freq) => {
                self.pending_sub = None;
                freq
            }
            BiasOutcome::Split(split) => {
                self.pending_sub = Some(split);
                split.freq_hi_khz
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::FrequencyTable;

    struct MockHal {
        times: Vec<CpuTimes>,
        table: Option<FrequencyTable>,
        applied: Vec<(u32, Rounding)>,
        fail_reads: bool,
    }

    impl MockHal {
        fn new(cpu_count: usize) -> Self {
            Self {
                times: vec![CpuTimes::default(); cpu_count],
                table: None,
                applied: Vec::new(),
                fail_reads: false,
            }
        }

        /// Advances one CPU by a window of `wall_us` with `idle_us` idle.
        fn advance(&mut self, cpu: usize, wall_us: u64, idle_us: u64) {
            self.times[cpu].wall_us += wall_us;
            self.times[cpu].idle_us += idle_us;
        }
    }

    impl CpufreqHal for MockHal {
        fn read_idle_wall_nice(
            &mut self,
            cpu: u32,
            _exclude_iowait: bool,
        ) -> Result<CpuTimes, GovError> {
            if self.fail_reads {
                return Err(GovError::SystemCheckFailed("injected".to_string()));
            }
            Ok(self.times[cpu as usize])
        }

        fn read_current_avg_freq(&mut self, _cpu: u32) -> Option<u32> {
            None
        }

        fn apply_frequency(
            &mut self,
            target_khz: u32,
            relation: Rounding,
        ) -> Result<u32, GovError> {
            let resolved = match &self.table {
                Some(table) => table.target(target_khz, relation),
                None => target_khz,
            };
            self.applied.push((resolved, relation));
            Ok(resolved)
        }

        fn frequency_table(&self) -> Option<&FrequencyTable> {
            self.table.as_ref()
        }
    }

    fn domain() -> PolicyDomain {
        PolicyDomain {
            id: 0,
            cpus: vec![0],
            cur_khz: 1_000_000,
            min_khz: 300_000,
            max_khz: 1_800_000,
        }
    }

    fn started(
        domain: PolicyDomain,
        multi: bool,
        hal: &mut MockHal,
        tunables: &Tunables,
    ) -> DomainGovernor {
        let mut gov = DomainGovernor::new(domain, multi);
        gov.start(hal, tunables).unwrap();
        gov
    }

    #[test]
    fn high_load_raises_through_the_grid() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        // Load 75 at 1.0 GHz: 75_000_000 > 70 * 1_000_000.
        hal.advance(0, 50_000, 12_500);
        gov.on_tick(&mut hal, &tunables, &board).unwrap();
        // load_at_max = 75 * 1000/1800 = 41, below the middle tier: the
        // target is the optimal ceiling.
        assert_eq!(hal.applied, vec![(1_728_000, Rounding::AtOrBelow)]);
        assert_eq!(gov.domain().cur_khz, 1_728_000);
    }

    #[test]
    fn saturated_domain_stretches_the_sampling_period() {
        let tunables = Tunables {
            sampling_down_factor: 3,
            ..Tunables::default()
        };
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut d = domain();
        d.cur_khz = 1_700_000;
        let mut gov = started(d, false, &mut hal, &tunables);

        // Load 95 at 1.7 GHz lands in the middle grid tier and the step
        // reaches policy max.
        hal.advance(0, 50_000, 2_500);
        let delay = gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(gov.domain().cur_khz, 1_800_000);
        assert_eq!(delay, Duration::from_micros(150_000));

        // Dropping load resets the multiplier along with the frequency.
        hal.advance(0, 150_000, 120_000);
        let delay = gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(delay, Duration::from_micros(50_000));
    }

    #[test]
    fn low_load_lowers_with_truncating_division() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        // Load 50 at 1.0 GHz: 50_000_000 < (70-10) * 1_000_000.
        hal.advance(0, 50_000, 25_000);
        gov.on_tick(&mut hal, &tunables, &board).unwrap();
        // 50_000_000 / 60 truncated.
        assert_eq!(hal.applied, vec![(833_333, Rounding::AtOrAbove)]);
    }

    #[test]
    fn decrease_clamps_to_policy_minimum() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        // Load 1 at 1.0 GHz: freq_next would be far below min.
        hal.advance(0, 100_000, 99_000);
        gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(hal.applied, vec![(300_000, Rounding::AtOrAbove)]);
    }

    #[test]
    fn hold_band_changes_nothing_across_repeated_cycles() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        // Load 65 sits between the decrease band (60) and the up
        // threshold (70): the frequency must hold, cycle after cycle.
        for _ in 0..5 {
            hal.advance(0, 50_000, 17_500);
            let delay = gov.on_tick(&mut hal, &tunables, &board).unwrap();
            assert_eq!(delay, Duration::from_micros(50_000));
        }
        assert!(hal.applied.is_empty());
        assert_eq!(gov.domain().cur_khz, 1_000_000);
    }

    #[test]
    fn busy_sibling_domain_pulls_frequency_to_sync() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(4);
        // CPU 2 lives in another domain and is saturated.
        board.publish(2, 95);
        let mut gov = started(domain(), true, &mut hal, &tunables);

        // Own load 65: neither increase nor decrease on its own.
        hal.advance(0, 50_000, 17_500);
        gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(hal.applied, vec![(1_728_000, Rounding::AtOrBelow)]);
    }

    #[test]
    fn bias_runs_the_two_phase_averaging_pass() {
        let tunables = Tunables {
            powersave_bias: 500,
            ..Tunables::default()
        };
        let mut hal = MockHal::new(1);
        hal.table = Some(FrequencyTable::new(vec![
            300_000, 600_000, 1_000_000, 1_400_000, 1_600_000, 1_800_000,
        ]));
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        // High load requests the optimal ceiling (1_728_000), which snaps
        // to 1_600_000; halved by the bias to 800_000, bracketed by
        // 600_000/1_000_000.
        hal.advance(0, 50_000, 2_500);
        let hi_delay = gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(hal.applied, vec![(1_000_000, Rounding::AtOrAbove)]);

        // Sub-sample pass applies the low bracket; the two delays cover
        // exactly one sampling interval.
        let lo_delay = gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(hal.applied.len(), 2);
        assert_eq!(hal.applied[1], (600_000, Rounding::AtOrBelow));
        assert_eq!(
            hi_delay + lo_delay,
            Duration::from_micros(tunables.sampling_rate_us)
        );
    }

    #[test]
    fn bias_extreme_pins_and_stops_sampling() {
        let tunables = Tunables {
            powersave_bias: 1000,
            ..Tunables::default()
        };
        let mut hal = MockHal::new(1);
        let mut gov = DomainGovernor::new(domain(), false);
        let delay = gov.start(&mut hal, &tunables).unwrap();
        assert_eq!(delay, None);
        assert_eq!(hal.applied, vec![(300_000, Rounding::AtOrAbove)]);
    }

    #[test]
    fn read_failure_aborts_cycle_without_frequency_change() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        hal.advance(0, 50_000, 12_500);
        hal.fail_reads = true;
        assert!(gov.on_tick(&mut hal, &tunables, &board).is_err());
        assert!(hal.applied.is_empty());

        // The next successful cycle still sees the whole window since the
        // last committed baseline and recovers the increase decision.
        hal.fail_reads = false;
        gov.on_tick(&mut hal, &tunables, &board).unwrap();
        assert_eq!(hal.applied, vec![(1_728_000, Rounding::AtOrBelow)]);
    }

    #[test]
    fn limits_change_reclamps_and_resamples() {
        let tunables = Tunables::default();
        let mut hal = MockHal::new(1);
        let board = LoadBoard::new(1);
        let mut gov = started(domain(), false, &mut hal, &tunables);

        hal.advance(0, 50_000, 17_500);
        gov.limits_changed(&mut hal, &tunables, &board, 300_000, 800_000)
            .unwrap();
        // The running 1.0 GHz exceeds the new max and is clamped first.
        assert_eq!(hal.applied[0], (800_000, Rounding::AtOrAbove));
        assert_eq!(gov.domain().max_khz, 800_000);
    }
}
