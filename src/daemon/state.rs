use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Cross-domain load high-water-marks, one slot per system CPU.
///
/// Writes and reads are relaxed on purpose: a domain reading another
/// domain's load only needs a best-effort, possibly-stale snapshot for its
/// sync heuristics. Races here are tolerated, not a correctness hazard.
#[derive(Debug)]
pub struct LoadBoard {
    max_load: Vec<AtomicU32>,
}

impl LoadBoard {
    pub fn new(cpu_count: usize) -> Self {
        let mut max_load = Vec::with_capacity(cpu_count);
        max_load.resize_with(cpu_count, || AtomicU32::new(0));
        Self { max_load }
    }

    pub fn publish(&self, cpu: u32, load: u32) {
        if let Some(slot) = self.max_load.get(cpu as usize) {
            slot.store(load, Ordering::Relaxed);
        }
    }

    /// Highest published load among CPUs outside the given domain.
    pub fn max_outside(&self, domain_cpus: &[u32]) -> u32 {
        let mut max = 0;
        for (cpu, slot) in self.max_load.iter().enumerate() {
            if domain_cpus.contains(&(cpu as u32)) {
                continue;
            }
            max = max.max(slot.load(Ordering::Relaxed));
        }
        max
    }

    pub fn cpu_count(&self) -> usize {
        self.max_load.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_outside_ignores_own_domain() {
        let board = LoadBoard::new(4);
        board.publish(0, 90);
        board.publish(1, 80);
        board.publish(2, 40);
        board.publish(3, 70);
        assert_eq!(board.max_outside(&[0, 1]), 70);
        assert_eq!(board.max_outside(&[2, 3]), 90);
        assert_eq!(board.max_outside(&[0, 1, 2, 3]), 0);
    }

    #[test]
    fn out_of_range_cpu_is_dropped() {
        let board = LoadBoard::new(2);
        board.publish(9, 100);
        assert_eq!(board.max_outside(&[]), 0);
    }
}
