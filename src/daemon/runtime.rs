//! Daemon lifecycle: domain discovery, per-domain sampling wiring, and
//! signal-driven shutdown with synchronous timer teardown.

use crate::config::loop_settings::{
    SHUTDOWN_POLL_INTERVAL_MS, STARTUP_SETTLE_MS, TIMER_THREAD_NAME_PREFIX,
};
use crate::config::tunables::Tunables;
use crate::controllers::governor::{DomainGovernor, PolicyDomain};
use crate::daemon::state::{LoadBoard, SHUTDOWN_REQUESTED};
use crate::daemon::timer::SamplingTimer;
use crate::daemon::types::GovError;
use crate::hal::sysfs::SysfsCpufreq;
use crate::resources::discovery;

use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

extern "C" fn handle_termination(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

fn install_signal_handlers() -> Result<(), GovError> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_termination as extern "C" fn(libc::c_int) as usize;
        libc::sigemptyset(&mut action.sa_mask);
        for sig in [libc::SIGTERM, libc::SIGINT] {
            if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
                return Err(GovError::SystemCheckFailed(format!(
                    "sigaction({sig}) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }
    }
    Ok(())
}

fn is_fatal_tick_error(e: &GovError) -> bool {
    match e {
        GovError::IoError(io) => matches!(
            io.kind(),
            ErrorKind::NotFound | ErrorKind::BrokenPipe | ErrorKind::PermissionDenied
        ),
        GovError::SystemCheckFailed(_) | GovError::PermissionDenied(_) => true,
        _ => false,
    }
}

pub fn run() -> Result<(), GovError> {
    install_signal_handlers()?;

    let domains = discovery::discover_domains()?;
    if domains.is_empty() {
        return Err(GovError::SystemCheckFailed(
            "No usable frequency domains found".to_string(),
        ));
    }
    let multi_domain = domains.len() > 1;
    let board = Arc::new(LoadBoard::new(discovery::max_cpu_id(&domains) as usize + 1));

    let mut tunables = Tunables::default();
    for domain in &domains {
        tunables.floor_sampling_rate(domain.transition_latency_ns);
    }
    tunables.validate()?;
    log::info!(
        "Sampling every {} us across {} domain(s)",
        tunables.sampling_rate_us,
        domains.len()
    );

    thread::sleep(Duration::from_millis(STARTUP_SETTLE_MS));

    let mut timers = Vec::new();
    for topology in &domains {
        let mut hal = match SysfsCpufreq::new(topology) {
            Ok(hal) => hal,
            Err(e) => {
                log::error!("policy{}: {e}; domain left unmanaged", topology.id);
                continue;
            }
        };
        let mut gov = DomainGovernor::new(
            PolicyDomain {
                id: topology.id,
                cpus: topology.cpus.clone(),
                cur_khz: topology.cur_khz,
                min_khz: topology.min_khz,
                max_khz: topology.max_khz,
            },
            multi_domain,
        );
        let first_delay = match gov.start(&mut hal, &tunables) {
            Ok(Some(delay)) => delay,
            // Pinned by a powersave-bias extreme, nothing to sample.
            Ok(None) => continue,
            Err(e) => {
                log::error!("policy{}: startup failed: {e}", topology.id);
                continue;
            }
        };
        let tick_board = Arc::clone(&board);
        let tick_tunables = tunables;
        let domain_id = topology.id;
        let name = format!("{TIMER_THREAD_NAME_PREFIX}{domain_id}");
        let timer = SamplingTimer::spawn(&name, move || {
            if SHUTDOWN_REQUESTED.load(Ordering::Acquire) {
                return None;
            }
            match gov.on_tick(&mut hal, &tick_tunables, &tick_board) {
                Ok(delay) => Some(delay),
                Err(e) if is_fatal_tick_error(&e) => {
                    log::error!("policy{domain_id}: {e}; stopping this domain");
                    None
                }
                Err(e) => {
                    log::warn!("policy{domain_id}: sampling cycle failed: {e}");
                    Some(Duration::from_micros(tick_tunables.sampling_rate_us))
                }
            }
        });
        timer.arm(first_delay);
        timers.push(timer);
    }

    if timers.is_empty() {
        log::warn!("No domain is being sampled; idling until shutdown");
    }

    while !SHUTDOWN_REQUESTED.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(SHUTDOWN_POLL_INTERVAL_MS));
    }

    log::info!("Shutdown requested, stopping {} sampling timer(s)", timers.len());
    for timer in &mut timers {
        timer.cancel_sync();
    }
    Ok(())
}
