//! Serialized event loop around a [`SyncController`].
//!
//! User intents, lifecycle signals and policy notifications may come from
//! different threads. All of them are funnelled through one channel into a
//! dedicated thread that owns the controller, so it sees exactly one event at
//! a time in arrival order.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::actuator::ActuatorClient;
use crate::controller::{ControlError, Event, SyncController};
use crate::display::OutputSink;
use crate::policy::{PolicyCallback, PolicyWatcher};
use crate::store::IntensityStore;

/// Handle to a running controller thread.
///
/// Dropping the handle tears the controller down without waiting for it.
pub struct ControllerHandle<A, P, S> {
    tx: mpsc::Sender<Event>,
    thread: Option<JoinHandle<SyncController<A, P, S>>>,
}

/// Move `controller` onto its own thread, activate it, and start consuming
/// events. Output goes to `out`.
pub fn spawn<A, P, S, O>(
    mut controller: SyncController<A, P, S>,
    mut out: O,
) -> ControllerHandle<A, P, S>
where
    A: ActuatorClient + Send + 'static,
    P: PolicyWatcher + Send + 'static,
    S: IntensityStore + Send + 'static,
    O: OutputSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Event>();
    let policy_tx = tx.clone();

    let thread = std::thread::spawn(move || {
        let on_change: PolicyCallback = Arc::new(move |flag| {
            if policy_tx.send(Event::PolicyChanged(flag)).is_err() {
                log::debug!("controller gone, dropping policy change {flag}");
            }
        });
        controller.activate(on_change, &mut out);

        for event in rx.iter() {
            log::debug!("event: {event:?}");
            match controller.handle(event, &mut out) {
                Ok(()) => {}
                Err(ControlError::Inactive(state)) => {
                    log::debug!("{event:?} ignored while {state}")
                }
                Err(e @ (ControlError::InvalidInput(_) | ControlError::PolicyLocked)) => {
                    log::info!("{event:?} rejected: {e}")
                }
                Err(e) => log::warn!("{event:?} failed: {e}"),
            }
            if event == Event::Teardown {
                break;
            }
        }
        // Also reached when every sender is gone.
        controller.teardown();
        controller
    });

    ControllerHandle {
        tx,
        thread: Some(thread),
    }
}

impl<A, P, S> ControllerHandle<A, P, S> {
    /// Queue an event. Returns `false` if the controller thread has exited.
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    /// A sender for producers on other threads.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    /// Tear the controller down and wait for its thread, handing the
    /// controller back. Re-raises a panic from the controller thread.
    pub fn shutdown(mut self) -> SyncController<A, P, S> {
        let _ = self.tx.send(Event::Teardown);
        let Some(thread) = self.thread.take() else {
            unreachable!("controller thread is only taken by shutdown");
        };
        match thread.join() {
            Ok(controller) => controller,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<A, P, S> Drop for ControllerHandle<A, P, S> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.tx.send(Event::Teardown);
        }
    }
}
