//! The process-wide decode lock.
//!
//! The decode library is not reentrant, so every seek/read on any handle of
//! any source goes through one [`DecodeGate`]. The gate is passed explicitly
//! to whoever decodes (frame cache, thumbnail workers, audio cache) rather
//! than living in a global.
//!
//! Lock discipline: the gate is never held while waiting on a cache-access
//! lock. Caches look up under their own lock and release it, take the gate,
//! decode into local buffers, drop the guard and only then publish under the
//! cache lock. Under the gate a cache lock may only be tried, never waited on.

use parking_lot::{Mutex, MutexGuard};
use splice_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cloneable handle to the shared decode lock.
#[derive(Clone, Default)]
pub struct DecodeGate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    lock: Mutex<()>,
    acquisitions: AtomicU64,
}

/// Proof that the decode lock is held. Released on drop.
pub struct DecodeGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl DecodeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the decode lock is available.
    pub fn lock(&self) -> DecodeGuard<'_> {
        let guard = self.inner.lock.lock();
        self.inner.acquisitions.fetch_add(1, Ordering::Relaxed);
        DecodeGuard { _guard: guard }
    }

    /// How many times the gate has been acquired.
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::Relaxed)
    }

    /// Whether two gates are the same lock.
    pub fn same_gate(&self, other: &DecodeGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for DecodeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeGate")
            .field("acquisitions", &self.acquisitions())
            .finish()
    }
}

/// Run `op` up to `attempts` times while it fails transiently.
///
/// Non-transient errors are returned immediately.
pub fn with_retries<T>(attempts: u32, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                debug!(attempt, attempts, error = %e, "{what} failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(attempts, error = %e, "{what} failed, giving up");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::SpliceError;

    #[test]
    fn test_retries_until_success() {
        let mut calls = 0;
        let result = with_retries(5, "read", || {
            calls += 1;
            if calls < 3 {
                Err(SpliceError::Decoder("glitch".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<()> = with_retries(5, "seek", || {
            calls += 1;
            Err(SpliceError::Decoder("broken".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retries(5, "seek", || {
            calls += 1;
            Err(SpliceError::InvalidParameter("past end".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_gate_is_shared_between_clones() {
        let gate = DecodeGate::new();
        let other = gate.clone();
        assert!(gate.same_gate(&other));

        let held = gate.lock();
        let waiter = std::thread::spawn(move || {
            let _guard = other.lock();
            other.acquisitions()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(held);
        assert_eq!(waiter.join().unwrap(), 2);
        assert_eq!(gate.acquisitions(), 2);
        assert!(!gate.same_gate(&DecodeGate::new()));
    }
}
