//! The scheduling driver: a per-domain cancellable, re-armable periodic
//! task. The tick callback returns the delay until its next invocation, so
//! the governor can stretch the period while pinned at max frequency and
//! interleave the short powersave-bias sub-sample passes.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Armed(Instant),
    Cancelled,
}

struct TimerShared {
    state: Mutex<TimerState>,
    cv: Condvar,
}

pub struct SamplingTimer {
    shared: Arc<TimerShared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SamplingTimer {
    /// Spawns the worker thread. The timer starts idle; call [`arm`] to
    /// schedule the first tick. A tick returning `None` stops re-arming
    /// until `arm` is called again.
    ///
    /// [`arm`]: SamplingTimer::arm
    pub fn spawn<F>(name: &str, mut tick: F) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::Idle),
            cv: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let builder = thread::Builder::new().name(name.to_string());
        let handle = builder
            .spawn(move || worker_loop(&worker_shared, &mut tick))
            .unwrap_or_else(|e| panic!("Failed to spawn timer thread: {e}"));
        Self {
            shared,
            worker: Some(handle),
        }
    }

    pub fn arm(&self, delay: Duration) {
        let mut state = self.shared.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state == TimerState::Cancelled {
            return;
        }
        *state = TimerState::Armed(Instant::now() + delay);
        self.shared.cv.notify_one();
    }

    /// Cancels the timer and joins the worker. After this returns there is
    /// no in-flight tick and none will ever run again.
    pub fn cancel_sync(&mut self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *state = TimerState::Cancelled;
            self.shared.cv.notify_one();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SamplingTimer {
    fn drop(&mut self) {
        self.cancel_sync();
    }
}

fn worker_loop<F>(shared: &TimerShared, tick: &mut F)
where
    F: FnMut() -> Option<Duration>,
{
    let mut guard = shared
        .state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    loop {
        match *guard {
            TimerState::Cancelled => return,
            TimerState::Idle => {
                guard = shared
                    .cv
                    .wait(guard)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
            TimerState::Armed(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    let (g, _) = shared
                        .cv
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    guard = g;
                    continue;
                }
                // Run the tick outside the lock so arm/cancel never block
                // on a slow callback.
                *guard = TimerState::Idle;
                drop(guard);
                let next = tick();
                guard = shared
                    .state
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                match (*guard, next) {
                    (TimerState::Cancelled, _) => return,
                    // A concurrent arm() wins over the tick's own schedule.
                    (TimerState::Armed(_), _) => {}
                    (TimerState::Idle, Some(delay)) => {
                        *guard = TimerState::Armed(Instant::now() + delay);
                    }
                    (TimerState::Idle, None) => {}
                }
            }
        }
    }
}
