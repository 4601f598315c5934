//! Frequency-domain topology discovery under the cpufreq sysfs tree.

use crate::daemon::types::GovError;
use crate::hal::filesystem::read_trimmed;
use crate::hal::FrequencyTable;
use crate::resources::sys_paths::{
    K_ATTR_AFFECTED_CPUS, K_ATTR_AVAILABLE_FREQS, K_ATTR_CPUINFO_MAX_FREQ,
    K_ATTR_CPUINFO_MIN_FREQ, K_ATTR_SCALING_CUR_FREQ, K_ATTR_TRANSITION_LATENCY, K_CPUFREQ_BASE,
};

use std::fs;
use std::path::{Path, PathBuf};

/// One frequency-control plane: the CPUs it covers and its hardware bounds.
#[derive(Debug, Clone)]
pub struct DomainTopology {
    pub id: u32,
    pub policy_dir: PathBuf,
    /// System CPU ids sharing this plane; the first is the policy CPU.
    pub cpus: Vec<u32>,
    pub min_khz: u32,
    pub max_khz: u32,
    pub cur_khz: u32,
    pub transition_latency_ns: u64,
    pub table: Option<FrequencyTable>,
}

fn attr_path(policy_dir: &Path, attr: &str) -> String {
    policy_dir.join(attr).to_string_lossy().into_owned()
}

fn read_attr_u64(policy_dir: &Path, attr: &str) -> Result<u64, GovError> {
    let raw = read_trimmed(&attr_path(policy_dir, attr))?;
    raw.parse::<u64>().map_err(|_| {
        GovError::InvalidInput(format!("Non-numeric {attr} for {policy_dir:?}: '{raw}'"))
    })
}

fn read_cpu_list(policy_dir: &Path) -> Result<Vec<u32>, GovError> {
    let raw = read_trimmed(&attr_path(policy_dir, K_ATTR_AFFECTED_CPUS))?;
    let mut cpus = Vec::new();
    for token in raw.split_whitespace() {
        let cpu = token.parse::<u32>().map_err(|_| {
            GovError::InvalidInput(format!("Bad CPU id '{token}' in {policy_dir:?}"))
        })?;
        cpus.push(cpu);
    }
    if cpus.is_empty() {
        return Err(GovError::SystemCheckFailed(format!(
            "Policy {policy_dir:?} lists no CPUs"
        )));
    }
    Ok(cpus)
}

fn read_freq_table(policy_dir: &Path) -> Option<FrequencyTable> {
    let raw = read_trimmed(&attr_path(policy_dir, K_ATTR_AVAILABLE_FREQS)).ok()?;
    let entries: Vec<u32> = raw
        .split_whitespace()
        .filter_map(|t| t.parse::<u32>().ok())
        .collect();
    if entries.is_empty() {
        None
    } else {
        Some(FrequencyTable::new(entries))
    }
}

fn probe_policy(id: u32, policy_dir: PathBuf) -> Result<DomainTopology, GovError> {
    let cpus = read_cpu_list(&policy_dir)?;
    let min_khz = read_attr_u64(&policy_dir, K_ATTR_CPUINFO_MIN_FREQ)? as u32;
    let max_khz = read_attr_u64(&policy_dir, K_ATTR_CPUINFO_MAX_FREQ)? as u32;
    let cur_khz = read_attr_u64(&policy_dir, K_ATTR_SCALING_CUR_FREQ)? as u32;
    let transition_latency_ns = read_attr_u64(&policy_dir, K_ATTR_TRANSITION_LATENCY).unwrap_or(0);
    let table = read_freq_table(&policy_dir);
    if min_khz == 0 || max_khz < min_khz {
        return Err(GovError::SystemCheckFailed(format!(
            "Degenerate bounds [{min_khz}, {max_khz}] for {policy_dir:?}"
        )));
    }
    Ok(DomainTopology {
        id,
        policy_dir,
        cpus,
        min_khz,
        max_khz,
        cur_khz,
        transition_latency_ns,
        table,
    })
}

/// Enumerates every `policyN` directory. Policies that fail to probe are
/// logged and skipped rather than failing the whole discovery.
pub fn discover_domains() -> Result<Vec<DomainTopology>, GovError> {
    let base = Path::new(K_CPUFREQ_BASE);
    let entries = fs::read_dir(base).map_err(|e| {
        GovError::SystemCheckFailed(format!("Cannot enumerate {K_CPUFREQ_BASE}: {e}"))
    })?;
    let mut domains = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(id_str) = name.strip_prefix("policy") else {
            continue;
        };
        let Ok(id) = id_str.parse::<u32>() else {
            continue;
        };
        match probe_policy(id, entry.path()) {
            Ok(domain) => {
                log::info!(
                    "Discovered domain policy{id}: cpus {:?}, {}..{} kHz, table: {}",
                    domain.cpus,
                    domain.min_khz,
                    domain.max_khz,
                    domain.table.is_some()
                );
                domains.push(domain);
            }
            Err(e) => log::warn!("Skipping policy{id}: {e}"),
        }
    }
    domains.sort_by_key(|d| d.id);
    Ok(domains)
}

/// Highest system CPU id across all discovered domains, for sizing the
/// cross-domain load board.
pub fn max_cpu_id(domains: &[DomainTopology]) -> u32 {
    domains
        .iter()
        .flat_map(|d| d.cpus.iter().copied())
        .max()
        .unwrap_or(0)
}
