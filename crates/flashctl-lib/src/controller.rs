//! Sync controller. Reconciles what the flash hardware reports with the policy
//! flag and the saved intensity.
//!
//! [`SyncController`] is the only component that writes to the actuator and
//! the only one that decides between a forced policy and a user's intent. It
//! is not reentrant: feed it one [`Event`] at a time (see [`crate::dispatch`]
//! for the threaded event loop). Every transition ends by publishing a fresh
//! [`DisplayState`], which is derived from controller state and never stored.
//!
//! Lifecycle: `Initializing → Active ⇄ Backgrounded → Destroyed`.

use std::fmt;

use crate::actuator::{ActuatorClient, ActuatorError, ActuatorState};
use crate::display::{DisplayState, IntensityOption, Notice, Output, OutputSink};
use crate::intensity::Intensity;
use crate::policy::{PolicyCallback, PolicyError, PolicyFlag, PolicyWatcher};
use crate::store::IntensityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initializing,
    Active,
    Backgrounded,
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Initializing => write!(f, "initializing"),
            Lifecycle::Active => write!(f, "active"),
            Lifecycle::Backgrounded => write!(f, "backgrounded"),
            Lifecycle::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Inputs to the controller, in delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// User flipped the main switch.
    Toggle(bool),
    /// User picked an intensity option. Raw, validated by the controller.
    SelectIntensity(i64),
    /// The external policy flag changed.
    PolicyChanged(PolicyFlag),
    /// The controlling view left the foreground.
    ScopeExit,
    /// The controlling view came back.
    ScopeEnter,
    Teardown,
}

/// Why an event did not take effect. None of these are fatal; the display
/// has already been brought back in line by the time one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No flash service is bound.
    ServiceUnavailable,
    /// The hardware refused or did not answer the call.
    InvalidActuatorState(ActuatorError),
    /// The policy flag could not be read; it was treated as off.
    PolicyReadFailure(PolicyError),
    /// Intensity outside `1..=5`.
    InvalidInput(i64),
    /// The policy forces the flash on; local control is suspended.
    PolicyLocked,
    /// The event is not accepted in this lifecycle state.
    Inactive(Lifecycle),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::ServiceUnavailable => write!(f, "Flash service unavailable"),
            ControlError::InvalidActuatorState(e) => write!(f, "{e}"),
            ControlError::PolicyReadFailure(e) => write!(f, "{e}"),
            ControlError::InvalidInput(level) => {
                write!(f, "Invalid intensity {level} (expected 1-5)")
            }
            ControlError::PolicyLocked => write!(f, "Flash is forced on by policy"),
            ControlError::Inactive(state) => write!(f, "Controller is {state}"),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::InvalidActuatorState(e) => Some(e),
            ControlError::PolicyReadFailure(e) => Some(e),
            _ => None,
        }
    }
}

/// Optimistic switch change awaiting the hardware's answer.
#[must_use]
struct PendingToggle {
    requested: bool,
}

pub struct SyncController<A, P, S> {
    /// `None` when no flash service is bound.
    actuator: Option<A>,
    policy: P,
    store: S,
    lifecycle: Lifecycle,
    flag: PolicyFlag,
    /// Last hardware reading.
    hardware: ActuatorState,
    /// Saved intensity; also the checked option.
    saved: Intensity,
    switch_checked: bool,
    options_enabled: bool,
}

impl<A, P, S> SyncController<A, P, S>
where
    A: ActuatorClient,
    P: PolicyWatcher,
    S: IntensityStore,
{
    pub fn new(actuator: Option<A>, policy: P, store: S) -> Self {
        SyncController {
            actuator,
            policy,
            store,
            lifecycle: Lifecycle::Initializing,
            flag: PolicyFlag::Off,
            hardware: ActuatorState::UNKNOWN,
            saved: Intensity::DEFAULT,
            switch_checked: false,
            options_enabled: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn policy_flag(&self) -> PolicyFlag {
        self.flag
    }

    pub fn hardware(&self) -> ActuatorState {
        self.hardware
    }

    pub fn saved_intensity(&self) -> Intensity {
        self.saved
    }

    pub fn actuator(&self) -> Option<&A> {
        self.actuator.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Project controller state onto what the presentation shows.
    pub fn display(&self) -> DisplayState {
        let forced = self.flag.is_forced_on();
        let available = self.actuator.is_some();
        let options_enabled = available && !forced && self.options_enabled;
        let shown = self.hardware.level().unwrap_or(self.saved);
        DisplayState {
            // An unbound service starts out unchecked even under a forced
            // policy; only a delivered policy change checks it.
            switch_checked: self.switch_checked || (forced && available),
            switch_enabled: available && !forced,
            intensity_options_enabled: options_enabled,
            options: Intensity::all()
                .map(|level| IntensityOption {
                    level,
                    checked: level == self.saved,
                    enabled: options_enabled,
                })
                .collect(),
            on_off_label: if self.hardware.enabled { "On" } else { "Off" }.into(),
            intensity_label: shown.to_string(),
        }
    }

    /// Apply one event.
    pub fn handle(
        &mut self,
        event: Event,
        out: &mut impl OutputSink,
    ) -> Result<(), ControlError> {
        match event {
            Event::Toggle(checked) => self.user_toggle(checked, out),
            Event::SelectIntensity(level) => self.user_select_intensity(level, out),
            Event::PolicyChanged(flag) => self.policy_changed(flag, out),
            Event::ScopeExit => self.scope_exit(),
            Event::ScopeEnter => self.scope_enter(out),
            Event::Teardown => {
                self.teardown();
                Ok(())
            }
        }
    }

    /// `Initializing → Active`: take initial readings, start observing the
    /// policy flag, publish the first display.
    pub fn activate(&mut self, on_policy_change: PolicyCallback, out: &mut impl OutputSink) {
        if self.lifecycle != Lifecycle::Initializing {
            log::debug!("activate ignored: controller is {}", self.lifecycle);
            return;
        }
        if self.actuator.is_none() {
            log::warn!("{}; controls will be inert", ControlError::ServiceUnavailable);
        }
        // Register before the first read: a change landing in between is then
        // either seen by the read or delivered as a notification.
        if let Err(e) = self.policy.register(on_policy_change) {
            log::warn!("{e}; external policy changes will not be tracked");
        }
        self.hardware = self.read_hardware();
        self.flag = self.read_policy();
        self.saved = self.store.get();
        self.switch_checked = self.hardware.enabled;
        self.options_enabled = self.hardware.enabled;

        self.lifecycle = Lifecycle::Active;
        log::info!(
            "flash controller active (flash {}, policy {}, saved intensity {})",
            if self.hardware.enabled { "on" } else { "off" },
            self.flag,
            self.saved
        );
        self.publish(out);
    }

    /// The user flipped the main switch.
    pub fn user_toggle(
        &mut self,
        checked: bool,
        out: &mut impl OutputSink,
    ) -> Result<(), ControlError> {
        self.require_active()?;
        if self.flag.is_forced_on() {
            log::info!("toggle ignored: flash is forced on by policy");
            self.publish(out);
            return Err(ControlError::PolicyLocked);
        }
        let Some(actuator) = &self.actuator else {
            log::error!("toggle rejected: {}", ControlError::ServiceUnavailable);
            self.switch_checked = false;
            out.emit(Output::Notice(Notice::ServiceUnavailable));
            self.publish(out);
            return Err(ControlError::ServiceUnavailable);
        };

        // Show the requested position until the hardware answers.
        self.switch_checked = checked;
        let pending = PendingToggle { requested: checked };
        self.publish(out);
        match actuator.set_enabled(checked) {
            Ok(()) => {
                self.commit_toggle(pending);
                self.publish(out);
                Ok(())
            }
            Err(e) => {
                log::warn!("set_enabled({checked}) failed: {e}");
                self.rollback_toggle(pending);
                self.publish(out);
                Err(ControlError::InvalidActuatorState(e))
            }
        }
    }

    /// The user picked an intensity option.
    pub fn user_select_intensity(
        &mut self,
        level: i64,
        out: &mut impl OutputSink,
    ) -> Result<(), ControlError> {
        self.require_active()?;
        let Some(level) = Intensity::new(level) else {
            log::warn!("{}", ControlError::InvalidInput(level));
            return Err(ControlError::InvalidInput(level));
        };
        if self.flag.is_forced_on() {
            log::info!("intensity {level} ignored: flash is forced on by policy");
            return Err(ControlError::PolicyLocked);
        }
        let Some(actuator) = &self.actuator else {
            // Remembered for the next time a flash service is bound.
            log::warn!("intensity {level} saved but not applied: no flash service");
            self.saved = level;
            self.store.set(level);
            self.publish(out);
            return Err(ControlError::ServiceUnavailable);
        };
        if let Err(e) = actuator.set_intensity(level) {
            log::warn!("intensity {level} not applied: {e}");
            return Err(ControlError::InvalidActuatorState(e));
        }

        self.saved = level;
        self.store.set(level);
        // The label follows what the hardware reports, not what was asked for.
        if let Some(reading) = self.try_read_hardware() {
            self.hardware = reading;
        }
        self.publish(out);
        Ok(())
    }

    /// The external policy flag changed.
    pub fn policy_changed(
        &mut self,
        flag: PolicyFlag,
        out: &mut impl OutputSink,
    ) -> Result<(), ControlError> {
        self.require_active()?;
        match flag {
            PolicyFlag::ForcedOn => {
                self.flag = flag;
                self.switch_checked = true;
                self.options_enabled = false;
                self.hardware = self.read_hardware();
                out.emit(Output::Notice(Notice::ExternallyManaged));
            }
            PolicyFlag::Off => {
                self.flag = flag;
                self.switch_checked = false;
                self.options_enabled = false;
                self.hardware = self.read_hardware();
            }
            PolicyFlag::Unknown => {
                log::warn!("ignoring unrecognized policy value");
                return Ok(());
            }
        }
        self.publish(out);
        Ok(())
    }

    /// `Active → Backgrounded`. Switches a lit flash off unless the policy
    /// forces it on. Best effort: failures are logged and swallowed.
    pub fn scope_exit(&mut self) -> Result<(), ControlError> {
        if !matches!(self.lifecycle, Lifecycle::Active | Lifecycle::Backgrounded) {
            return Err(ControlError::Inactive(self.lifecycle));
        }
        self.flag = self.read_policy();
        if !self.flag.is_forced_on()
            && let Some(actuator) = &self.actuator
        {
            match actuator.get_enabled_intensity() {
                Ok(state) if state.enabled => {
                    log::info!("leaving foreground with flash lit, switching it off");
                    match actuator.set_enabled(false) {
                        Ok(()) => self.hardware = ActuatorState::UNKNOWN,
                        Err(e) => log::warn!("could not switch flash off: {e}"),
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("could not read flash before backgrounding: {e}"),
            }
        }
        self.lifecycle = Lifecycle::Backgrounded;
        Ok(())
    }

    /// `Backgrounded → Active`. Another actor may have changed the hardware
    /// or the policy meanwhile, so everything is read fresh.
    pub fn scope_enter(&mut self, out: &mut impl OutputSink) -> Result<(), ControlError> {
        if !matches!(self.lifecycle, Lifecycle::Active | Lifecycle::Backgrounded) {
            return Err(ControlError::Inactive(self.lifecycle));
        }
        self.hardware = self.read_hardware();
        self.flag = self.read_policy();
        self.saved = self.store.get();
        if self.flag.is_forced_on() {
            self.switch_checked = true;
            self.options_enabled = false;
        } else {
            self.switch_checked = self.hardware.enabled;
            self.options_enabled = self.hardware.enabled;
        }
        self.lifecycle = Lifecycle::Active;
        self.publish(out);
        Ok(())
    }

    /// Release the policy observation. Terminal; idempotent.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.policy.unregister();
        self.lifecycle = Lifecycle::Destroyed;
        log::info!("flash controller torn down");
    }

    // ── Toggle commit ──

    fn commit_toggle(&mut self, pending: PendingToggle) {
        let reading = self.try_read_hardware().unwrap_or(ActuatorState {
            enabled: pending.requested,
            intensity: 0,
        });
        self.hardware = reading;
        self.switch_checked = pending.requested;
        self.options_enabled = pending.requested;
        match reading.level() {
            Some(level) if level != self.saved => {
                self.store.set(level);
                self.saved = level;
            }
            Some(_) => {}
            None if reading.enabled => log::warn!(
                "flash reported intensity {} after toggle, not saving it",
                reading.intensity
            ),
            None => {}
        }
    }

    fn rollback_toggle(&mut self, _pending: PendingToggle) {
        self.switch_checked = false;
        self.options_enabled = false;
    }

    // ── Helpers ──

    fn require_active(&self) -> Result<(), ControlError> {
        if self.lifecycle == Lifecycle::Active {
            Ok(())
        } else {
            log::debug!("event ignored: controller is {}", self.lifecycle);
            Err(ControlError::Inactive(self.lifecycle))
        }
    }

    fn try_read_hardware(&self) -> Option<ActuatorState> {
        let actuator = self.actuator.as_ref()?;
        match actuator.get_enabled_intensity() {
            Ok(state) => {
                if state.enabled && state.level().is_none() {
                    log::warn!("flash reported out-of-range intensity {}", state.intensity);
                }
                Some(state)
            }
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    fn read_hardware(&self) -> ActuatorState {
        self.try_read_hardware().unwrap_or(ActuatorState::UNKNOWN)
    }

    fn read_policy(&self) -> PolicyFlag {
        match self.policy.current() {
            Ok(flag) => flag,
            Err(e) => {
                log::warn!("{}; treating policy as off", ControlError::PolicyReadFailure(e));
                PolicyFlag::Off
            }
        }
    }

    fn publish(&self, out: &mut impl OutputSink) {
        out.emit(Output::Display(self.display()));
    }
}
