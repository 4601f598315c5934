pub const SHUTDOWN_POLL_INTERVAL_MS: u64 = 200;
pub const STARTUP_SETTLE_MS: u64 = 100;
pub const TIMER_THREAD_NAME_PREFIX: &str = "demandd-domain";
