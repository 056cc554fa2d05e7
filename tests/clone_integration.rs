//! Integration tests for the clone transport.
//!
//! These tests clone real git repositories created via tempfile. Local
//! clones never challenge for credentials, so they exercise the worker and
//! cleanup paths without a server. A loopback HTTP server that refuses every
//! request with `401` drives the credential callback through libgit2.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use credbridge::auth::{Controller, CredentialBridge, ScriptedSource};
use credbridge::git::{
    clone_repository, spawn_clone, CloneError, CloneOptions, CloneUrl,
};

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    /// Get the path to the repository.
    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn url(&self) -> CloneUrl {
        CloneUrl::parse(&self.path().to_string_lossy()).expect("local path parses")
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn local_clone_needs_no_credentials() {
    let repo = TestRepo::new();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("clone");
    let bridge = CredentialBridge::with_ask_timeout(Duration::from_millis(50));

    let report = clone_repository(&repo.url(), &dest, &bridge, &CloneOptions::default()).unwrap();

    assert_eq!(report.path, dest);
    assert!(!report.challenged);
    assert!(!report.used_credential_helper);
    assert!(dest.join("README.md").exists());
    assert!(!bridge.was_username_asked());
    assert!(!bridge.was_password_asked());
    assert!(!bridge.auth_data_saved());
}

#[test]
fn spawned_clone_finishes() {
    let repo = TestRepo::new();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("clone");
    let bridge = Arc::new(CredentialBridge::new());

    let handle = spawn_clone(repo.url(), dest.clone(), bridge, CloneOptions::default()).unwrap();
    let report = handle.join().unwrap();

    assert!(report.path.join(".git").exists());
}

#[test]
fn clone_into_empty_existing_directory() {
    let repo = TestRepo::new();
    let target = TempDir::new().unwrap();
    let bridge = CredentialBridge::new();

    let report =
        clone_repository(&repo.url(), target.path(), &bridge, &CloneOptions::default()).unwrap();
    assert!(report.path.join("README.md").exists());
}

#[test]
fn non_empty_destination_rejected() {
    let repo = TestRepo::new();
    let target = TempDir::new().unwrap();
    std::fs::write(target.path().join("keep.txt"), "mine").unwrap();
    let bridge = CredentialBridge::new();

    let err = clone_repository(&repo.url(), target.path(), &bridge, &CloneOptions::default())
        .unwrap_err();

    assert!(matches!(err, CloneError::DestinationExists { .. }));
    assert!(target.path().join("keep.txt").exists());
}

#[test]
fn failed_clone_leaves_no_directory() {
    let missing = TempDir::new().unwrap();
    let source = missing.path().join("does-not-exist");
    let url = CloneUrl::parse(&source.to_string_lossy()).unwrap();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("clone");
    let bridge = CredentialBridge::new();

    let err = clone_repository(&url, &dest, &bridge, &CloneOptions::default()).unwrap_err();

    assert!(matches!(err, CloneError::Git { .. }));
    assert!(!err.is_authentication_failure());
    assert!(!dest.exists());
}

/// HTTP server on 127.0.0.1 that answers every request with a Basic challenge.
struct UnauthorizedServer {
    port: u16,
    requests: Arc<AtomicUsize>,
}

impl UnauthorizedServer {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = respond_unauthorized(stream);
            }
        });

        Self { port, requests }
    }

    fn url(&self, userinfo: &str) -> CloneUrl {
        CloneUrl::parse(&format!(
            "http://{}127.0.0.1:{}/projectA.git",
            userinfo, self.port
        ))
        .unwrap()
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn respond_unauthorized(mut stream: TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    // Read the request head; requests carry no body.
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
    }
    stream.write_all(
        b"HTTP/1.1 401 Unauthorized\r\n\
          WWW-Authenticate: Basic realm=\"credbridge-test\"\r\n\
          Content-Length: 0\r\n\
          Connection: close\r\n\r\n",
    )?;
    stream.flush()
}

#[test]
fn rejected_password_is_authentication_failure() {
    let server = UnauthorizedServer::start();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("projectA");

    let bridge = CredentialBridge::with_ask_timeout(Duration::from_secs(10));
    bridge.supply_password("gitpasswordwrong").unwrap();

    let err = clone_repository(
        &server.url("gituser@"),
        &dest,
        &bridge,
        &CloneOptions::default(),
    )
    .unwrap_err();

    assert!(err.is_authentication_failure(), "unexpected error: {:?}", err);
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("Authentication failed"));
    assert!(!dest.exists());
    assert!(!bridge.was_username_asked());
    assert!(bridge.was_password_asked());
    assert_eq!(bridge.forget_count(), 1);
    assert!(!bridge.auth_data_saved());
    assert!(server.requests() >= 2);
}

#[test]
fn username_asked_when_url_has_none() {
    let server = UnauthorizedServer::start();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("projectA");

    let bridge = Arc::new(CredentialBridge::with_ask_timeout(Duration::from_secs(10)));
    let handle = spawn_clone(
        server.url(""),
        dest.clone(),
        Arc::clone(&bridge),
        CloneOptions::default(),
    )
    .unwrap();

    let source = ScriptedSource::new(Some("gituser".into()), Some("gitpassword".into()));
    Controller::new(&bridge, source)
        .with_poll_interval(Duration::from_millis(10))
        .run("http://127.0.0.1/projectA.git", || handle.is_finished())
        .unwrap();

    let err = handle.join().unwrap_err();
    assert!(err.is_authentication_failure(), "unexpected error: {:?}", err);
    assert!(bridge.was_username_asked());
    assert!(bridge.was_password_asked());
    assert!(!dest.exists());
}

#[test]
fn unanswered_challenge_times_out_without_leftovers() {
    let server = UnauthorizedServer::start();
    let target = TempDir::new().unwrap();
    let dest = target.path().join("projectA");

    let bridge = CredentialBridge::with_ask_timeout(Duration::from_millis(100));
    let err = clone_repository(
        &server.url("gituser@"),
        &dest,
        &bridge,
        &CloneOptions::default(),
    )
    .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {:?}", err);
    assert!(!err.is_authentication_failure());
    assert!(!dest.exists());
    assert_eq!(bridge.forget_count(), 0);
}
