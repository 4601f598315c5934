//! Persistent-fd reader for the per-CPU accounting lines of `/proc/stat`.

use crate::algorithms::load_math::CpuTimes;
use crate::daemon::types::GovError;
use crate::hal::filesystem::open_file_for_read;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::OnceLock;

const BUFFER_SIZE: usize = 8192;

static TICK_USEC: OnceLock<u64> = OnceLock::new();

/// Microseconds per USER_HZ tick, from the C library. 10_000 on the usual
/// HZ=100 configuration.
fn tick_usec() -> u64 {
    *TICK_USEC.get_or_init(|| {
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if hz > 0 {
            1_000_000 / hz as u64
        } else {
            10_000
        }
    })
}

pub struct StatMonitor {
    file: File,
    buffer: Vec<u8>,
}

impl StatMonitor {
    pub fn new() -> Result<Self, GovError> {
        let file = open_file_for_read("/proc/stat")?;
        Ok(Self {
            file,
            buffer: vec![0u8; BUFFER_SIZE],
        })
    }

    /// Reads the cumulative counters of one CPU. With `exclude_iowait`,
    /// iowait ticks count as busy time instead of idle.
    pub fn read_cpu(&mut self, cpu: u32, exclude_iowait: bool) -> Result<CpuTimes, GovError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(GovError::IoError)?;
        let bytes_read = self.file.read(&mut self.buffer).map_err(GovError::IoError)?;
        if bytes_read == 0 {
            return Err(GovError::StatParseError("Empty /proc/stat".to_string()));
        }
        let content = std::str::from_utf8(&self.buffer[..bytes_read])
            .map_err(|_| GovError::StatParseError("Invalid UTF-8".to_string()))?;
        let mut prefix = String::with_capacity(8);
        prefix.push_str("cpu");
        prefix.push_str(itoa::Buffer::new().format(cpu));
        prefix.push(' ');
        for line in content.lines() {
            if let Some(fields) = line.strip_prefix(&prefix) {
                return parse_cpu_line(fields, exclude_iowait);
            }
        }
        Err(GovError::StatParseError(format!(
            "No cpu{cpu} line in /proc/stat"
        )))
    }
}

fn parse_cpu_line(fields: &str, exclude_iowait: bool) -> Result<CpuTimes, GovError> {
    // user nice system idle iowait irq softirq steal [guest guest_nice]
    let mut ticks = [0u64; 8];
    let mut count = 0;
    for token in fields.split_whitespace().take(8) {
        ticks[count] = token
            .parse::<u64>()
            .map_err(|_| GovError::StatParseError(format!("Bad field '{token}'")))?;
        count += 1;
    }
    if count < 5 {
        return Err(GovError::StatParseError(format!(
            "Short cpu line: '{fields}'"
        )));
    }
    let [user, nice, system, idle, iowait, irq, softirq, steal] = ticks;
    let tick = tick_usec();
    let wall = user + nice + system + idle + iowait + irq + softirq + steal;
    let idle_ticks = if exclude_iowait { idle } else { idle + iowait };
    Ok(CpuTimes {
        idle_us: idle_ticks * tick,
        wall_us: wall * tick,
        nice_us: nice * tick,
    })
}
