//! Run-scoped cancellation
//!
//! One [`CancelToken`] is shared by the walker thread and every worker of a
//! generation run. It is tripped either by the first fatal error a worker
//! hits or by SIGINT/SIGTERM. Everything that loops checks the token before
//! taking the next unit of work.
//!
//! On a second interrupt the process exits immediately with
//! [`EXIT_CODE_CANCELLED`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for interrupted runs
pub const EXIT_CODE_CANCELLED: i32 = 130;

const NOT_CANCELLED: u8 = 0;
const CANCELLED_BY_FAILURE: u8 = 1;
const CANCELLED_BY_SIGNAL: u8 = 2;

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A worker hit a fatal error
    Failure,
    /// SIGINT/SIGTERM, or a caller cancelled the run from outside
    Interrupted,
}

#[derive(Debug)]
struct CancelState {
    reason: AtomicU8,
    signal_count: AtomicU8,
}

/// Cooperative cancellation flag, cheap to clone
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                reason: AtomicU8::new(NOT_CANCELLED),
                signal_count: AtomicU8::new(0),
            }),
        }
    }

    /// Cancel the run. The first reason recorded sticks.
    ///
    /// Returns true if this call performed the cancellation.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let code = match reason {
            CancelReason::Failure => CANCELLED_BY_FAILURE,
            CancelReason::Interrupted => CANCELLED_BY_SIGNAL,
        };
        self.state
            .reason
            .compare_exchange(NOT_CANCELLED, code, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.reason.load(Ordering::SeqCst) != NOT_CANCELLED
    }

    /// The reason recorded by the first successful [`cancel`](Self::cancel)
    pub fn reason(&self) -> Option<CancelReason> {
        match self.state.reason.load(Ordering::SeqCst) {
            CANCELLED_BY_FAILURE => Some(CancelReason::Failure),
            CANCELLED_BY_SIGNAL => Some(CancelReason::Interrupted),
            _ => None,
        }
    }

    /// Record an interrupt. Returns true on the second and later interrupts,
    /// when the caller should stop waiting for workers.
    pub fn interrupt(&self) -> bool {
        let count = self.state.signal_count.fetch_add(1, Ordering::SeqCst);
        self.cancel(CancelReason::Interrupted);
        count >= 1
    }

    /// Install SIGINT/SIGTERM handlers that cancel this token.
    ///
    /// Must be called at most once per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.interrupt() {
                tracing::warn!("second interrupt received, exiting immediately");
                std::process::exit(EXIT_CODE_CANCELLED);
            }
            tracing::warn!("interrupt received, stopping generation");
        })
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn test_first_reason_sticks() {
        let token = CancelToken::new();
        assert!(token.cancel(CancelReason::Failure));
        assert!(!token.cancel(CancelReason::Interrupted));
        assert_eq!(token.reason(), Some(CancelReason::Failure));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        thread::spawn(move || {
            clone.cancel(CancelReason::Interrupted);
        })
        .join()
        .unwrap();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::Interrupted));
    }

    #[test]
    fn test_double_interrupt() {
        let token = CancelToken::new();
        assert!(!token.interrupt());
        assert!(token.is_cancelled());
        assert!(token.interrupt());
    }
}
