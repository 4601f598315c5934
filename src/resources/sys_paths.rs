pub const K_CPUFREQ_BASE: &str = "/sys/devices/system/cpu/cpufreq";

pub const K_ATTR_AFFECTED_CPUS: &str = "affected_cpus";
pub const K_ATTR_CPUINFO_MIN_FREQ: &str = "cpuinfo_min_freq";
pub const K_ATTR_CPUINFO_MAX_FREQ: &str = "cpuinfo_max_freq";
pub const K_ATTR_TRANSITION_LATENCY: &str = "cpuinfo_transition_latency";
pub const K_ATTR_SCALING_CUR_FREQ: &str = "scaling_cur_freq";
pub const K_ATTR_SCALING_GOVERNOR: &str = "scaling_governor";
pub const K_ATTR_SCALING_SETSPEED: &str = "scaling_setspeed";
pub const K_ATTR_AVAILABLE_FREQS: &str = "scaling_available_frequencies";

pub const K_USERSPACE_GOVERNOR: &str = "userspace";
