//! Bounded actuator calls.
//!
//! The hardware service can hang. [`BoundedActuator`] owns the real client on
//! a worker thread and waits at most `timeout` for each call, so the caller's
//! event sequence keeps moving even if the service never answers.
//!
//! A call that times out is abandoned. If it has not started yet the worker
//! skips it. If it was already running and it switched the flash on, the
//! worker switches the flash back off, matching the rolled-back switch the
//! caller shows.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::*;

type Job<A> = Box<dyn FnOnce(&A) + Send>;

/// What the worker does with a result nobody is waiting for.
#[derive(Debug, Clone, Copy)]
enum Late {
    Discard,
    SwitchOff,
}

/// Set by the caller once it stops waiting for a job.
#[derive(Default)]
struct Abandoned(Mutex<bool>);

impl Abandoned {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct BoundedActuator<A> {
    jobs: mpsc::Sender<Job<A>>,
    timeout: Duration,
}

impl<A: ActuatorClient + Send + 'static> BoundedActuator<A> {
    /// Move `inner` onto a dedicated worker thread.
    ///
    /// The worker exits once this wrapper is dropped and any in-flight call
    /// returns. A hung call is never joined.
    pub fn new(inner: A, timeout: Duration) -> Self {
        let (jobs, rx) = mpsc::channel::<Job<A>>();
        std::thread::spawn(move || {
            for job in rx {
                job(&inner);
            }
        });
        BoundedActuator { jobs, timeout }
    }

    fn call<T: Send + 'static>(
        &self,
        op: &'static str,
        late: Late,
        f: impl FnOnce(&A) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let abandoned = Arc::new(Abandoned::default());
        let worker_abandoned = Arc::clone(&abandoned);
        self.jobs
            .send(Box::new(move |inner: &A| {
                if *worker_abandoned.lock() {
                    log::debug!("{op} skipped, caller stopped waiting");
                    return;
                }
                let result = f(inner);
                // Reply under the lock so the caller either sees it or has
                // already marked the job abandoned.
                let gave_up = worker_abandoned.lock();
                if !*gave_up {
                    let _ = reply_tx.send(result);
                    return;
                }
                drop(gave_up);
                if let (Late::SwitchOff, Ok(_)) = (late, &result) {
                    log::warn!("{op} finished after its timeout, switching flash back off");
                    if let Err(e) = inner.set_enabled(false) {
                        log::warn!("could not undo late {op}: {e}");
                    }
                }
            }))
            .map_err(|_| ActuatorError::Unavailable(format!("{op}: worker thread gone")))?;
        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let mut gave_up = abandoned.lock();
                if let Ok(result) = reply_rx.try_recv() {
                    return result;
                }
                *gave_up = true;
                log::warn!("{op} did not return within {:?}", self.timeout);
                Err(ActuatorError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ActuatorError::Unavailable(format!(
                "{op}: worker thread panicked"
            ))),
        }
    }
}

impl<A: ActuatorClient + Send + 'static> ActuatorClient for BoundedActuator<A> {
    fn get_enabled_intensity(&self) -> Result<ActuatorState> {
        self.call("get_enabled_intensity", Late::Discard, |a| {
            a.get_enabled_intensity()
        })
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        let late = if enabled { Late::SwitchOff } else { Late::Discard };
        self.call("set_enabled", late, move |a| a.set_enabled(enabled))
    }

    fn set_intensity(&self, level: Intensity) -> Result<()> {
        self.call("set_intensity", Late::Discard, move |a| a.set_intensity(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::MockActuator;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    /// Sleeps before answering every call.
    struct SlowFlash {
        delay: Duration,
    }

    impl ActuatorClient for SlowFlash {
        fn get_enabled_intensity(&self) -> Result<ActuatorState> {
            std::thread::sleep(self.delay);
            Ok(ActuatorState {
                enabled: true,
                intensity: 2,
            })
        }

        fn set_enabled(&self, _enabled: bool) -> Result<()> {
            std::thread::sleep(self.delay);
            Ok(())
        }

        fn set_intensity(&self, _level: Intensity) -> Result<()> {
            std::thread::sleep(self.delay);
            Ok(())
        }
    }

    /// Panics on every call.
    struct BrokenFlash;

    impl ActuatorClient for BrokenFlash {
        fn get_enabled_intensity(&self) -> Result<ActuatorState> {
            panic!("driver crashed")
        }

        fn set_enabled(&self, _enabled: bool) -> Result<()> {
            panic!("driver crashed")
        }

        fn set_intensity(&self, _level: Intensity) -> Result<()> {
            panic!("driver crashed")
        }
    }

    /// Reads answer at once; switching takes `delay`. Shares what it did
    /// with the test.
    #[derive(Clone)]
    struct SlowSwitch {
        delay: Duration,
        lit: Arc<AtomicBool>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SlowSwitch {
        fn new(delay: Duration) -> Self {
            SlowSwitch {
                delay,
                lit: Arc::new(AtomicBool::new(false)),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ActuatorClient for SlowSwitch {
        fn get_enabled_intensity(&self) -> Result<ActuatorState> {
            self.record("get");
            Ok(ActuatorState {
                enabled: self.lit.load(Ordering::SeqCst),
                intensity: 1,
            })
        }

        fn set_enabled(&self, enabled: bool) -> Result<()> {
            self.record(if enabled { "on" } else { "off" });
            std::thread::sleep(self.delay);
            self.lit.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        fn set_intensity(&self, _level: Intensity) -> Result<()> {
            self.record("intensity");
            Ok(())
        }
    }

    #[test]
    fn passes_results_through() {
        let bounded = BoundedActuator::new(MockActuator::new().with_level(4), Duration::from_secs(5));
        bounded.set_enabled(true).unwrap();
        let state = bounded.get_enabled_intensity().unwrap();
        assert!(state.enabled);
        assert_eq!(state.intensity, 4);
    }

    #[test]
    fn passes_errors_through() {
        let mock = MockActuator::new();
        mock.fail_set_enabled.set(true);
        let bounded = BoundedActuator::new(mock, Duration::from_secs(5));
        assert!(matches!(
            bounded.set_enabled(true),
            Err(ActuatorError::InvalidState(_))
        ));
    }

    #[test]
    fn hung_call_times_out() {
        let bounded = BoundedActuator::new(
            SlowFlash {
                delay: Duration::from_secs(2),
            },
            Duration::from_millis(50),
        );
        let start = Instant::now();
        let err = bounded.set_enabled(true).unwrap_err();
        assert_eq!(err, ActuatorError::Timeout(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn fast_call_within_bound_succeeds() {
        let bounded = BoundedActuator::new(
            SlowFlash {
                delay: Duration::from_millis(5),
            },
            Duration::from_secs(5),
        );
        assert_eq!(bounded.get_enabled_intensity().unwrap().intensity, 2);
    }

    #[test]
    fn panicking_client_reports_unavailable() {
        let bounded = BoundedActuator::new(BrokenFlash, Duration::from_secs(5));
        assert!(matches!(
            bounded.get_enabled_intensity(),
            Err(ActuatorError::Unavailable(_))
        ));
        // Worker is gone; later calls fail fast instead of hanging.
        assert!(matches!(
            bounded.set_enabled(false),
            Err(ActuatorError::Unavailable(_))
        ));
    }

    #[test]
    fn late_switch_on_is_undone() {
        let flash = SlowSwitch::new(Duration::from_millis(100));
        let bounded = BoundedActuator::new(flash.clone(), Duration::from_millis(10));
        assert_eq!(
            bounded.set_enabled(true),
            Err(ActuatorError::Timeout(Duration::from_millis(10)))
        );
        std::thread::sleep(Duration::from_millis(600));
        assert!(!flash.lit.load(Ordering::SeqCst), "flash must not stay lit");
        assert_eq!(flash.calls(), ["on", "off"]);
    }

    #[test]
    fn late_switch_off_is_left_alone() {
        let flash = SlowSwitch::new(Duration::from_millis(100));
        flash.lit.store(true, Ordering::SeqCst);
        let bounded = BoundedActuator::new(flash.clone(), Duration::from_millis(10));
        assert!(bounded.set_enabled(false).is_err());
        std::thread::sleep(Duration::from_millis(400));
        assert!(!flash.lit.load(Ordering::SeqCst));
        assert_eq!(flash.calls(), ["off"]);
    }

    #[test]
    fn queued_call_is_skipped_after_timeout() {
        let flash = SlowSwitch::new(Duration::from_millis(100));
        let bounded = BoundedActuator::new(flash.clone(), Duration::from_millis(10));
        assert!(bounded.set_enabled(false).is_err());
        // Queued behind the slow switch, so it times out before it starts.
        assert!(bounded.get_enabled_intensity().is_err());
        assert!(bounded.set_intensity(Intensity::DEFAULT).is_err());
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(flash.calls(), ["off"]);
    }

    #[test]
    fn worker_recovers_after_abandoned_calls() {
        let flash = SlowSwitch::new(Duration::from_millis(100));
        let bounded = BoundedActuator::new(flash.clone(), Duration::from_millis(10));
        assert!(bounded.set_enabled(false).is_err());
        std::thread::sleep(Duration::from_millis(300));
        let state = bounded.get_enabled_intensity().unwrap();
        assert!(!state.enabled);
    }
}
