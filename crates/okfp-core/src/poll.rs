//! Timed retry.
//!
//! Runs a check until it succeeds, the timeout elapses, or the caller raises a
//! cancel flag. The check always runs at least once. Between attempts the
//! thread sleeps for the poll interval, clipped to the time remaining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Satisfied,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub status: PollStatus,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl PollReport {
    pub fn is_satisfied(&self) -> bool {
        self.status == PollStatus::Satisfied
    }
}

pub fn poll_until<E, F>(timeout: Duration, interval: Duration, check: F) -> Result<PollReport, E>
where
    F: FnMut() -> Result<bool, E>,
{
    run(timeout, interval, None, check)
}

/// Like [`poll_until`], but stops early once `cancel` is set.
pub fn poll_until_cancelled<E, F>(
    timeout: Duration,
    interval: Duration,
    cancel: &AtomicBool,
    check: F,
) -> Result<PollReport, E>
where
    F: FnMut() -> Result<bool, E>,
{
    run(timeout, interval, Some(cancel), check)
}

fn run<E, F>(
    timeout: Duration,
    interval: Duration,
    cancel: Option<&AtomicBool>,
    mut check: F,
) -> Result<PollReport, E>
where
    F: FnMut() -> Result<bool, E>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let report = |status, attempts| PollReport {
        status,
        attempts,
        elapsed: start.elapsed(),
    };

    loop {
        if attempts > 0
            && let Some(flag) = cancel
            && flag.load(Ordering::Relaxed)
        {
            return Ok(report(PollStatus::Cancelled, attempts));
        }

        attempts += 1;
        if check()? {
            return Ok(report(PollStatus::Satisfied, attempts));
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(report(PollStatus::TimedOut, attempts));
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_checks_once() {
        let mut calls = 0;
        let report = poll_until::<(), _>(Duration::ZERO, Duration::from_millis(10), || {
            calls += 1;
            Ok(false)
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(report.status, PollStatus::TimedOut);
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_satisfied_after_retries() {
        let mut calls = 0;
        let report = poll_until::<(), _>(Duration::from_secs(5), Duration::from_millis(1), || {
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();
        assert!(report.is_satisfied());
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn test_timeout_is_bounded() {
        let report = poll_until::<(), _>(Duration::from_millis(30), Duration::from_millis(5), || {
            Ok(false)
        })
        .unwrap();
        assert_eq!(report.status, PollStatus::TimedOut);
        assert!(report.attempts >= 2);
        assert!(report.elapsed >= Duration::from_millis(30));
        assert!(report.elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_check_error_propagates() {
        let result = poll_until(Duration::from_secs(1), Duration::from_millis(1), || {
            Err::<bool, _>("link down")
        });
        assert_eq!(result, Err("link down"));
    }

    #[test]
    fn test_cancel_stops_after_first_attempt() {
        let cancel = AtomicBool::new(true);
        let mut calls = 0;
        let report = poll_until_cancelled::<(), _>(
            Duration::from_secs(60),
            Duration::from_millis(1),
            &cancel,
            || {
                calls += 1;
                Ok(false)
            },
        )
        .unwrap();
        assert_eq!(report.status, PollStatus::Cancelled);
        assert_eq!(calls, 1);
    }
}
