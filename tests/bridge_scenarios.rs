//! End-to-end credential exchanges between a clone worker and a controller.
//!
//! A fake HTTP remote drives a [`CredentialNegotiator`] the way the libgit2
//! credential callback does: it asks for credentials, and asks again when it
//! rejects what it got.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use credbridge::auth::{
    AuthError, Controller, ControllerOutcome, CredentialBridge, CredentialField, ScriptedSource,
};
use credbridge::git::{CloneError, CloneUrl, CredentialNegotiator};

const WAIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(5);

/// A remote that accepts exactly one username/password pair.
struct FakeRemote {
    url: CloneUrl,
    username: &'static str,
    password: &'static str,
}

impl FakeRemote {
    fn new(url: &str) -> Self {
        Self {
            url: CloneUrl::parse(url).expect("valid url"),
            username: "gituser",
            password: "gitpassword",
        }
    }

    /// Authenticate the way the transport callback loop does.
    fn clone_with(&self, bridge: &CredentialBridge) -> Result<(), CloneError> {
        let mut negotiator = CredentialNegotiator::new(self.url.as_str());
        loop {
            let creds = negotiator.next_credentials(bridge, self.url.username())?;
            if creds.username == self.username && creds.password == self.password {
                negotiator.finish(bridge);
                return Ok(());
            }
        }
    }
}

/// Start the clone on a worker thread; `done` flips when it returns.
fn spawn_clone(
    remote: FakeRemote,
    bridge: &Arc<CredentialBridge>,
) -> (thread::JoinHandle<Result<(), CloneError>>, Arc<AtomicBool>) {
    let done = Arc::new(AtomicBool::new(false));
    let handle = {
        let bridge = Arc::clone(bridge);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let result = remote.clone_with(&bridge);
            done.store(true, Ordering::Release);
            result
        })
    };
    (handle, done)
}

#[test]
fn username_and_password_requested_when_url_has_no_user() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    let (worker, done) = spawn_clone(FakeRemote::new("http://localhost/projectA.git"), &bridge);

    assert!(bridge.wait_until_username_asked(WAIT));
    bridge.supply_username("gituser").unwrap();
    assert!(bridge.wait_until_password_asked(WAIT));
    bridge.supply_password("gitpassword").unwrap();

    worker.join().unwrap().unwrap();
    assert!(done.load(Ordering::Acquire));
    assert!(bridge.was_username_asked());
    assert!(bridge.was_password_asked());
    assert!(bridge.auth_data_saved());
    assert_eq!(bridge.forget_count(), 0);
}

#[test]
fn username_in_url_skips_username_request() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    let (worker, _done) = spawn_clone(
        FakeRemote::new("http://gituser@localhost/projectA.git"),
        &bridge,
    );

    assert!(bridge.wait_until_password_asked(WAIT));
    bridge.supply_password("gitpassword").unwrap();

    worker.join().unwrap().unwrap();
    assert!(!bridge.was_username_asked());
    assert!(bridge.was_password_asked());
}

#[test]
fn wrong_password_is_authentication_failure_not_timeout() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    let (worker, _done) = spawn_clone(
        FakeRemote::new("http://gituser@localhost/projectA.git"),
        &bridge,
    );

    assert!(bridge.wait_until_password_asked(WAIT));
    bridge.supply_password("gitpasswordwrong").unwrap();

    let started = Instant::now();
    let err = worker.join().unwrap().unwrap_err();
    assert!(started.elapsed() < WAIT);

    assert!(err.is_authentication_failure());
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("Authentication failed"));
    assert_eq!(bridge.forget_count(), 1);
    assert!(!bridge.auth_data_saved());
}

#[test]
fn unanswered_password_times_out() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(Duration::from_millis(50)));
    let (worker, _done) = spawn_clone(
        FakeRemote::new("http://gituser@localhost/projectA.git"),
        &bridge,
    );

    let err = worker.join().unwrap().unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_authentication_failure());
    assert!(bridge.was_password_asked());
}

#[test]
fn answer_supplied_before_request_is_used() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    bridge.supply_username("gituser").unwrap();
    bridge.supply_password("gitpassword").unwrap();

    let (worker, _done) = spawn_clone(FakeRemote::new("http://localhost/projectA.git"), &bridge);
    worker.join().unwrap().unwrap();
    assert!(bridge.was_username_asked());
}

#[test]
fn controller_drives_full_exchange() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    let (worker, done) = spawn_clone(FakeRemote::new("http://localhost/projectA.git"), &bridge);

    let source = ScriptedSource::new(Some("gituser".into()), Some("gitpassword".into()));
    let outcome = Controller::new(&bridge, source)
        .with_poll_interval(POLL)
        .run("http://localhost/projectA.git", || done.load(Ordering::Acquire))
        .unwrap();

    assert_eq!(outcome, ControllerOutcome::Finished { answered: 2 });
    worker.join().unwrap().unwrap();
}

#[test]
fn controller_giving_up_cancels_worker() {
    let bridge = Arc::new(CredentialBridge::with_ask_timeout(WAIT));
    let (worker, done) = spawn_clone(FakeRemote::new("http://localhost/projectA.git"), &bridge);

    let source = ScriptedSource::new(Some("gituser".into()), None);
    let outcome = Controller::new(&bridge, source)
        .with_poll_interval(POLL)
        .run("http://localhost/projectA.git", || done.load(Ordering::Acquire))
        .unwrap();

    assert_eq!(outcome, ControllerOutcome::Cancelled);
    let err = worker.join().unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(
        err,
        CloneError::Auth(AuthError::Cancelled {
            field: CredentialField::Password
        })
    ));
}
