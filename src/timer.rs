//! Blocking wait support for the channel state machines
//!
//! Every synchronous exchange in the client has the same shape: the caller
//! thread transmits a request, then parks itself with a deadline while the
//! receive worker drives the state machine forward and wakes it up. The
//! [SyncState] cell is the single synchronization point for that pattern: a
//! state value behind a mutex plus a condition variable that is notified on
//! every transition. A wake-up that races with the deadline is resolved by
//! re-examining the state under the lock, so a caller is never left blocked
//! and a late transition is never lost.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct SyncState<S> {
    state: Mutex<S>,
    changed: Condvar,
}

impl<S: Copy + PartialEq> SyncState<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            changed: Condvar::new(),
        }
    }

    /// Returns the current state
    pub fn get(&self) -> S {
        *self.state.lock().unwrap()
    }

    /// Unconditionally moves to `next` and wakes any waiter
    pub fn set(&self, next: S) {
        *self.state.lock().unwrap() = next;
        self.changed.notify_all();
    }

    /// Moves to `next` only when the current state is exactly `expected`.
    /// Returns whether the transition happened
    pub fn transition(&self, expected: S, next: S) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != expected {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }

    /// Runs `f` with the state locked and wakes any waiter afterwards. Used
    /// by the receive worker for transitions that depend on the current
    /// state and must not interleave with a caller's timeout handling
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let result = f(&mut state);
        drop(state);
        self.changed.notify_all();
        result
    }

    /// Blocks the calling thread while the state equals `hold`, up to
    /// `timeout`. Returns the state observed on exit: `hold` itself means
    /// the deadline elapsed without a transition
    pub fn wait_while(&self, timeout: Duration, hold: S) -> S {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while *state == hold {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _) = self.changed.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
        *state
    }
}
