//! Real hardware accessor over the sysfs cpufreq userspace interface.

use crate::algorithms::load_math::CpuTimes;
use crate::daemon::types::GovError;
use crate::hal::filesystem::{open_file_for_write, read_trimmed, write_to_stream};
use crate::hal::{CpufreqHal, FrequencyTable, Rounding};
use crate::monitors::stat_monitor::StatMonitor;
use crate::resources::discovery::DomainTopology;
use crate::resources::sys_paths::{
    K_ATTR_SCALING_GOVERNOR, K_ATTR_SCALING_SETSPEED, K_USERSPACE_GOVERNOR,
};

use std::fs::File;

/// Drives one policy domain through `scaling_setspeed`. Requires the
/// `userspace` scaling governor to be active on the policy.
pub struct SysfsCpufreq {
    setspeed: File,
    stat: StatMonitor,
    table: Option<FrequencyTable>,
    min_khz: u32,
    max_khz: u32,
}

impl SysfsCpufreq {
    pub fn new(topology: &DomainTopology) -> Result<Self, GovError> {
        let governor_path = topology
            .policy_dir
            .join(K_ATTR_SCALING_GOVERNOR)
            .to_string_lossy()
            .into_owned();
        let governor = read_trimmed(&governor_path)?;
        if governor != K_USERSPACE_GOVERNOR {
            return Err(GovError::SystemCheckFailed(format!(
                "policy{} runs '{governor}', need '{K_USERSPACE_GOVERNOR}'",
                topology.id
            )));
        }
        let setspeed_path = topology
            .policy_dir
            .join(K_ATTR_SCALING_SETSPEED)
            .to_string_lossy()
            .into_owned();
        let setspeed = open_file_for_write(&setspeed_path)?;
        Ok(Self {
            setspeed,
            stat: StatMonitor::new()?,
            table: topology.table.clone(),
            min_khz: topology.min_khz,
            max_khz: topology.max_khz,
        })
    }
}

impl CpufreqHal for SysfsCpufreq {
    fn read_idle_wall_nice(
        &mut self,
        cpu: u32,
        exclude_iowait: bool,
    ) -> Result<CpuTimes, GovError> {
        self.stat.read_cpu(cpu, exclude_iowait)
    }

    fn read_current_avg_freq(&mut self, _cpu: u32) -> Option<u32> {
        // The userspace interface has no interval-averaged readout; the
        // engine falls back to the last applied frequency.
        None
    }

    fn apply_frequency(&mut self, target_khz: u32, relation: Rounding) -> Result<u32, GovError> {
        let clamped = target_khz.clamp(self.min_khz, self.max_khz);
        let resolved = match &self.table {
            Some(table) => table.target(clamped, relation),
            None => clamped,
        };
        write_to_stream(&mut self.setspeed, resolved as u64)?;
        Ok(resolved)
    }

    fn frequency_table(&self) -> Option<&FrequencyTable> {
        self.table.as_ref()
    }
}
