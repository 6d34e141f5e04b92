use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Panicked,
    /// The thread did not finish in time and was left detached.
    TimedOut,
}

/// Join a worker thread, giving up after `timeout`.
///
/// std offers no timed join, so this polls `is_finished`. A thread that misses
/// the deadline is detached; whatever it owns is released when it eventually exits.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration, name: &str) -> JoinOutcome {
    let deadline = Instant::now() + timeout;

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(
                thread = name,
                timeout_ms = timeout.as_millis() as u64,
                "Thread did not stop in time, detaching"
            );
            return JoinOutcome::TimedOut;
        }
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }

    match handle.join() {
        Ok(_) => JoinOutcome::Joined,
        Err(_) => {
            tracing::error!(thread = name, "Thread panicked");
            JoinOutcome::Panicked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn joins_finished_thread() {
        let handle = std::thread::spawn(|| 42);
        assert_eq!(
            join_with_timeout(handle, Duration::from_secs(1), "quick"),
            JoinOutcome::Joined
        );
    }

    #[test]
    fn detaches_thread_that_overruns_timeout() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let outcome = join_with_timeout(handle, Duration::from_millis(50), "stuck");
        release.store(true, Ordering::Release);

        assert_eq!(outcome, JoinOutcome::TimedOut);
    }

    #[test]
    fn reports_panicked_thread() {
        let handle = std::thread::spawn(|| panic!("boom"));
        assert_eq!(
            join_with_timeout(handle, Duration::from_secs(1), "panicky"),
            JoinOutcome::Panicked
        );
    }
}
