//! auth::challenge
//!
//! One-shot rendezvous cell for a single credential field.
//!
//! # State machine
//!
//! ```text
//! Unasked --ask--> Pending --supply--> Supplied(value)
//! Unasked --supply--> Supplied(value)      (pre-staged)
//! ```
//!
//! Each transition happens at most once. A repeated ask after `Supplied`
//! returns the same value; a repeated supply is refused with
//! [`AuthError::AlreadySupplied`] and the first value stands.
//!
//! # Invariants
//!
//! - Every state change happens under the mutex and is followed by
//!   `notify_all`, and every waiter re-checks its predicate under the same
//!   mutex, so a signal cannot be lost whichever thread arrives first.
//! - The asked flag is set under the mutex together with the `Pending`
//!   transition and never reverts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::errors::{AuthError, CredentialField};

/// Longest single condvar wait; the deadline is re-checked after each.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChallengeState {
    Unasked,
    Pending,
    Supplied(String),
}

/// A single-value handoff between the transport worker and the controller.
#[derive(Debug)]
pub struct Challenge {
    field: CredentialField,
    state: Mutex<ChallengeState>,
    changed: Condvar,
    asked: AtomicBool,
}

impl Challenge {
    /// Create an unasked challenge for `field`.
    pub fn new(field: CredentialField) -> Self {
        Self {
            field,
            state: Mutex::new(ChallengeState::Unasked),
            changed: Condvar::new(),
            asked: AtomicBool::new(false),
        }
    }

    /// The field this challenge is for.
    pub fn field(&self) -> CredentialField {
        self.field
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // state enum is always left valid, so keep using it.
    fn lock(&self) -> MutexGuard<'_, ChallengeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Ask for the value, blocking until it is supplied.
    ///
    /// Returns early with [`AuthError::Cancelled`] once `cancelled` is set
    /// (the setter must call [`Challenge::wake`] afterwards), and with
    /// [`AuthError::Timeout`] after `timeout`.
    pub fn ask(&self, timeout: Duration, cancelled: &AtomicBool) -> Result<String, AuthError> {
        // `None` when the bound is too large to represent: wait indefinitely.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();

        if *state == ChallengeState::Unasked {
            *state = ChallengeState::Pending;
        }
        self.asked.store(true, Ordering::Release);
        self.changed.notify_all();

        loop {
            if let ChallengeState::Supplied(value) = &*state {
                return Ok(value.clone());
            }
            if cancelled.load(Ordering::Acquire) {
                return Err(AuthError::Cancelled { field: self.field });
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(AuthError::Timeout {
                            field: self.field,
                            waited: timeout,
                        });
                    }
                    (deadline - now).min(MAX_WAIT_SLICE)
                }
                None => MAX_WAIT_SLICE,
            };
            state = self
                .changed
                .wait_timeout(state, slice)
                .unwrap_or_else(|p| p.into_inner())
                .0;
        }
    }

    /// Supply the value, releasing a blocked [`Challenge::ask`].
    pub fn supply(&self, value: impl Into<String>) -> Result<(), AuthError> {
        let mut state = self.lock();
        if let ChallengeState::Supplied(_) = *state {
            return Err(AuthError::AlreadySupplied { field: self.field });
        }
        *state = ChallengeState::Supplied(value.into());
        self.changed.notify_all();
        Ok(())
    }

    /// Block until the challenge has been asked, up to `timeout`.
    ///
    /// Returns whether it was asked; never errors.
    pub fn wait_until_asked(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (_state, result) = self
            .changed
            .wait_timeout_while(state, timeout, |_| !self.asked.load(Ordering::Acquire))
            .unwrap_or_else(|p| p.into_inner());
        !result.timed_out() || self.was_asked()
    }

    /// Non-blocking: has the challenge been asked?
    pub fn was_asked(&self) -> bool {
        self.asked.load(Ordering::Acquire)
    }

    /// Non-blocking: has a value been supplied (or pre-staged)?
    pub fn is_supplied(&self) -> bool {
        matches!(*self.lock(), ChallengeState::Supplied(_))
    }

    /// Wake every waiter so it re-checks its predicate.
    ///
    /// Taking the lock first orders this after any waiter that has checked
    /// the cancellation flag but not yet parked.
    pub fn wake(&self) {
        let _state = self.lock();
        self.changed.notify_all();
    }
}
