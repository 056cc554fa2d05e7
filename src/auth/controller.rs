//! auth::controller
//!
//! Controller-side driver for a [`CredentialBridge`].
//!
//! The controller runs on its own thread (usually the main thread), waits for
//! the worker to ask for a field, obtains the value from a
//! [`CredentialSource`], and supplies it. It stops when the operation reports
//! it has finished, or cancels the bridge when the source gives up.

use std::thread;
use std::time::Duration;

use tracing::debug;

use super::bridge::CredentialBridge;
use super::errors::CredentialField;
use crate::ui::prompts::PromptError;

/// Default interval between checks of the operation's completion.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const FIELDS: [CredentialField; 2] = [CredentialField::Username, CredentialField::Password];

/// Somewhere credential values come from.
pub trait CredentialSource {
    /// Produce a value for `field`, or `Ok(None)` to abandon the flow.
    fn provide(&mut self, field: CredentialField, url: &str)
        -> Result<Option<String>, PromptError>;
}

/// Fixed answers, handed out once each.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    username: Option<String>,
    password: Option<String>,
}

impl ScriptedSource {
    /// Answer with the given values; a missing value abandons the flow.
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }
}

impl CredentialSource for ScriptedSource {
    fn provide(
        &mut self,
        field: CredentialField,
        _url: &str,
    ) -> Result<Option<String>, PromptError> {
        Ok(match field {
            CredentialField::Username => self.username.take(),
            CredentialField::Password => self.password.take(),
        })
    }
}

/// How a controller run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerOutcome {
    /// The operation finished; `answered` fields were supplied along the way.
    Finished {
        /// Number of challenges answered
        answered: usize,
    },
    /// The source declined a challenge and the bridge was cancelled.
    Cancelled,
}

/// Answers bridge challenges until the operation finishes.
#[derive(Debug)]
pub struct Controller<'a, S> {
    bridge: &'a CredentialBridge,
    source: S,
    poll: Duration,
}

impl<'a, S: CredentialSource> Controller<'a, S> {
    /// Drive `bridge` with answers from `source`.
    pub fn new(bridge: &'a CredentialBridge, source: S) -> Self {
        Self {
            bridge,
            source,
            poll: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the polling interval.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Run until `finished` returns true.
    ///
    /// # Errors
    ///
    /// Propagates a source failure after cancelling the bridge so the worker
    /// is not left blocked.
    pub fn run(
        &mut self,
        url: &str,
        finished: impl Fn() -> bool,
    ) -> Result<ControllerOutcome, PromptError> {
        let mut answered = 0;

        while !finished() {
            // Nothing left to answer: just wait for the operation to end.
            if FIELDS.iter().all(|&field| self.bridge.is_supplied(field)) {
                thread::sleep(self.poll);
                continue;
            }

            for field in FIELDS {
                if self.bridge.is_supplied(field) || !self.bridge.wait_until_asked(field, self.poll)
                {
                    continue;
                }

                match self.source.provide(field, url) {
                    Ok(Some(value)) => match self.bridge.supply(field, value) {
                        Ok(()) => answered += 1,
                        // Someone else answered first; their value stands.
                        Err(e) => debug!(%field, error = %e, "supply skipped"),
                    },
                    Ok(None) => {
                        debug!(%field, "credential source declined");
                        self.bridge.cancel();
                        return Ok(ControllerOutcome::Cancelled);
                    }
                    Err(e) => {
                        self.bridge.cancel();
                        return Err(e);
                    }
                }
            }
        }

        Ok(ControllerOutcome::Finished { answered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, GitHttpAuthenticator};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(10);
    const POLL: Duration = Duration::from_millis(5);

    type Answers = Result<(Option<String>, String), AuthError>;

    fn ask_all(bridge: &CredentialBridge, ask_username: bool) -> Answers {
        let user = if ask_username {
            Some(bridge.ask_username("http://host/r.git")?)
        } else {
            None
        };
        let pass = bridge.ask_password("http://host/r.git")?;
        Ok((user, pass))
    }

    fn spawn_worker(
        bridge: &Arc<CredentialBridge>,
        done: &Arc<AtomicBool>,
        ask_username: bool,
    ) -> thread::JoinHandle<Answers> {
        let bridge = Arc::clone(bridge);
        let done = Arc::clone(done);
        thread::spawn(move || {
            let result = ask_all(&bridge, ask_username);
            done.store(true, Ordering::Release);
            result
        })
    }

    #[test]
    fn answers_both_fields() {
        let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
        let done = Arc::new(AtomicBool::new(false));
        let worker = spawn_worker(&bridge, &done, true);

        let source = ScriptedSource::new(Some("gituser".into()), Some("gitpassword".into()));
        let outcome = Controller::new(&bridge, source)
            .with_poll_interval(POLL)
            .run("http://host/r.git", || done.load(Ordering::Acquire))
            .unwrap();

        assert_eq!(outcome, ControllerOutcome::Finished { answered: 2 });
        let (user, pass) = worker.join().unwrap().unwrap();
        assert_eq!(user.as_deref(), Some("gituser"));
        assert_eq!(pass, "gitpassword");
    }

    #[test]
    fn only_password_when_username_not_asked() {
        let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
        let done = Arc::new(AtomicBool::new(false));
        let worker = spawn_worker(&bridge, &done, false);

        let source = ScriptedSource::new(Some("unused".into()), Some("gitpassword".into()));
        let outcome = Controller::new(&bridge, source)
            .with_poll_interval(POLL)
            .run("http://host/r.git", || done.load(Ordering::Acquire))
            .unwrap();

        assert_eq!(outcome, ControllerOutcome::Finished { answered: 1 });
        worker.join().unwrap().unwrap();
        assert!(!bridge.was_username_asked());
    }

    #[test]
    fn declining_cancels_worker() {
        let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
        let done = Arc::new(AtomicBool::new(false));
        let worker = spawn_worker(&bridge, &done, true);

        let outcome = Controller::new(&bridge, ScriptedSource::default())
            .with_poll_interval(POLL)
            .run("http://host/r.git", || done.load(Ordering::Acquire))
            .unwrap();

        assert_eq!(outcome, ControllerOutcome::Cancelled);
        assert!(worker.join().unwrap().unwrap_err().is_cancelled());
        assert!(bridge.was_cancelled());
    }

    #[test]
    fn waits_without_spinning_after_all_fields_answered() {
        let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
        let done = Arc::new(AtomicBool::new(false));
        let worker = {
            let bridge = Arc::clone(&bridge);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let result = ask_all(&bridge, true);
                // A long transfer after authentication.
                thread::sleep(Duration::from_millis(500));
                done.store(true, Ordering::Release);
                result
            })
        };

        let polls = AtomicUsize::new(0);
        let source = ScriptedSource::new(Some("gituser".into()), Some("gitpassword".into()));
        let outcome = Controller::new(&bridge, source)
            .with_poll_interval(Duration::from_millis(100))
            .run("http://host/r.git", || {
                polls.fetch_add(1, Ordering::Relaxed);
                done.load(Ordering::Acquire)
            })
            .unwrap();

        assert_eq!(outcome, ControllerOutcome::Finished { answered: 2 });
        worker.join().unwrap().unwrap();
        let polls = polls.load(Ordering::Relaxed);
        assert!(polls < 50, "finished() polled {} times", polls);
    }

    #[test]
    fn returns_immediately_when_already_finished() {
        let bridge = CredentialBridge::new();
        let outcome = Controller::new(&bridge, ScriptedSource::default())
            .run("u", || true)
            .unwrap();
        assert_eq!(outcome, ControllerOutcome::Finished { answered: 0 });
    }
}
