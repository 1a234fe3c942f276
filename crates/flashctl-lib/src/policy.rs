//! External flash policy: the watcher trait, a file-backed watcher and a test stub.
//!
//! Some other actor (a quick-settings tile, a camera app) can force the flash
//! on by writing `1` to a system-wide flag. This module reads that flag and
//! reports each change of it exactly once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

// ── Flag ──

/// Observed value of the external policy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyFlag {
    Off,
    ForcedOn,
    /// Stored value is neither `0` nor `1`.
    Unknown,
}

impl PolicyFlag {
    pub fn from_raw(value: i64) -> Self {
        match value {
            0 => PolicyFlag::Off,
            1 => PolicyFlag::ForcedOn,
            _ => PolicyFlag::Unknown,
        }
    }

    pub fn is_forced_on(self) -> bool {
        self == PolicyFlag::ForcedOn
    }
}

impl fmt::Display for PolicyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyFlag::Off => write!(f, "off"),
            PolicyFlag::ForcedOn => write!(f, "forced-on"),
            PolicyFlag::Unknown => write!(f, "unknown"),
        }
    }
}

// ── Error type ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    ReadFailed(String),
    RegisterFailed(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ReadFailed(e) => write!(f, "Policy read failed: {e}"),
            PolicyError::RegisterFailed(e) => write!(f, "Policy watch registration failed: {e}"),
        }
    }
}

impl std::error::Error for PolicyError {}

pub type Result<T> = std::result::Result<T, PolicyError>;

// ── Trait ──

/// Change callback. Invoked from whatever thread observes the change.
pub type PolicyCallback = Arc<dyn Fn(PolicyFlag) + Send + Sync>;

/// Read access to the policy flag plus change observation.
pub trait PolicyWatcher {
    /// Current flag. A flag that was never written reads as `Off`.
    fn current(&self) -> Result<PolicyFlag>;

    /// Start observing. `on_change` fires once per transition after this
    /// call; the value at registration time is the baseline, not an event.
    /// Registering again replaces the previous callback.
    fn register(&mut self, on_change: PolicyCallback) -> Result<()>;

    /// Stop observing. Safe to call when not registered.
    fn unregister(&mut self);
}

// ── Transition filter ──

/// Passes a flag through only when it differs from the last one seen.
#[derive(Debug, Default)]
pub struct TransitionFilter {
    last: Option<PolicyFlag>,
}

impl TransitionFilter {
    /// Create a filter with an optional baseline. With no baseline the first
    /// observation is reported.
    pub fn new(baseline: Option<PolicyFlag>) -> Self {
        TransitionFilter { last: baseline }
    }

    /// Feed an observation. Returns `Some(flag)` on a transition.
    pub fn observe(&mut self, flag: PolicyFlag) -> Option<PolicyFlag> {
        if self.last == Some(flag) {
            return None;
        }
        self.last = Some(flag);
        Some(flag)
    }
}

// ── Stop signal ──

/// Wait on a `(Mutex<bool>, Condvar)` pair with a timeout.
///
/// Returns `true` if the signal was raised, `false` on timeout.
fn wait_on_signal(signal: &(Mutex<bool>, Condvar), timeout: Duration) -> bool {
    let (lock, cvar) = signal;
    match lock.lock() {
        Ok(guard) => {
            if *guard {
                return true;
            }
            match cvar.wait_timeout(guard, timeout) {
                Ok((guard, _)) => *guard,
                Err(e) => *e.into_inner().0,
            }
        }
        Err(_) => {
            log::warn!("policy stop signal poisoned, stopping watcher");
            true
        }
    }
}

fn raise_signal(signal: &(Mutex<bool>, Condvar)) {
    if let Ok(mut raised) = signal.0.lock() {
        *raised = true;
        signal.1.notify_all();
    }
}

// ── File-backed watcher ──

/// Reads the flag from a file holding a single integer and polls it on a
/// background thread while registered.
pub struct FilePolicy {
    path: PathBuf,
    interval: Duration,
    worker: Option<Worker>,
}

struct Worker {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: JoinHandle<()>,
}

impl FilePolicy {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        FilePolicy {
            path: path.into(),
            interval,
            worker: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.worker.is_some()
    }
}

/// Read the flag file. Missing file → `Off`; unparseable content → `Unknown`.
pub fn read_flag_file(path: &Path) -> Result<PolicyFlag> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text
            .trim()
            .parse::<i64>()
            .map(PolicyFlag::from_raw)
            .unwrap_or(PolicyFlag::Unknown)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PolicyFlag::Off),
        Err(e) => Err(PolicyError::ReadFailed(format!("{}: {e}", path.display()))),
    }
}

impl PolicyWatcher for FilePolicy {
    fn current(&self) -> Result<PolicyFlag> {
        read_flag_file(&self.path)
    }

    fn register(&mut self, on_change: PolicyCallback) -> Result<()> {
        self.unregister();
        if self.interval.is_zero() {
            return Err(PolicyError::RegisterFailed(
                "poll interval must be non-zero".into(),
            ));
        }

        let mut filter = TransitionFilter::new(read_flag_file(&self.path).ok());
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let path = self.path.clone();
        let interval = self.interval;
        let stop_worker = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !wait_on_signal(&stop_worker, interval) {
                match read_flag_file(&path) {
                    Ok(flag) => {
                        if let Some(flag) = filter.observe(flag) {
                            log::debug!("policy flag changed: {flag}");
                            on_change(flag);
                        }
                    }
                    Err(e) => log::warn!("{e}"),
                }
            }
        });

        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    fn unregister(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        raise_signal(&worker.stop);
        if worker.handle.join().is_err() {
            log::warn!("policy watcher thread panicked");
        }
    }
}

impl Drop for FilePolicy {
    fn drop(&mut self) {
        self.unregister();
    }
}

// ── Test stub ──

/// Scriptable [`PolicyWatcher`] for unit and integration tests.
///
/// Clones share state, so a test can keep one handle while the controller
/// owns another. [`StubPolicy::set`] delivers the callback synchronously on
/// the calling thread, like a real observer firing from a foreign thread.
pub mod stub {
    use super::*;

    struct Inner {
        flag: PolicyFlag,
        fail_reads: bool,
        callback: Option<PolicyCallback>,
        filter: TransitionFilter,
        registrations: usize,
        unregistrations: usize,
    }

    #[derive(Clone)]
    pub struct StubPolicy {
        inner: Arc<Mutex<Inner>>,
    }

    impl StubPolicy {
        pub fn new(flag: PolicyFlag) -> Self {
            StubPolicy {
                inner: Arc::new(Mutex::new(Inner {
                    flag,
                    fail_reads: false,
                    callback: None,
                    filter: TransitionFilter::default(),
                    registrations: 0,
                    unregistrations: 0,
                })),
            }
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Change the flag and notify the registered callback on a transition.
        pub fn set(&self, flag: PolicyFlag) {
            let callback = {
                let mut inner = self.lock();
                inner.flag = flag;
                match inner.callback.clone() {
                    Some(cb) => inner.filter.observe(flag).map(|f| (cb, f)),
                    None => None,
                }
            };
            if let Some((cb, flag)) = callback {
                cb(flag);
            }
        }

        /// Make `current()` fail until cleared.
        pub fn set_read_failure(&self, fail: bool) {
            self.lock().fail_reads = fail;
        }

        pub fn is_registered(&self) -> bool {
            self.lock().callback.is_some()
        }

        pub fn registrations(&self) -> usize {
            self.lock().registrations
        }

        pub fn unregistrations(&self) -> usize {
            self.lock().unregistrations
        }
    }

    impl PolicyWatcher for StubPolicy {
        fn current(&self) -> Result<PolicyFlag> {
            let inner = self.lock();
            if inner.fail_reads {
                return Err(PolicyError::ReadFailed("stub: read failure injected".into()));
            }
            Ok(inner.flag)
        }

        fn register(&mut self, on_change: PolicyCallback) -> Result<()> {
            let mut inner = self.lock();
            let baseline = inner.flag;
            inner.filter = TransitionFilter::new(Some(baseline));
            inner.callback = Some(on_change);
            inner.registrations += 1;
            Ok(())
        }

        fn unregister(&mut self) {
            let mut inner = self.lock();
            if inner.callback.take().is_some() {
                inner.unregistrations += 1;
            }
        }
    }
}
