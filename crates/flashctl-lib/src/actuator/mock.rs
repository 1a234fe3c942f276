//! In-memory actuator for unit and integration tests.

use std::cell::{Cell, RefCell};

use super::*;

/// A recorded actuator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Get,
    SetEnabled(bool),
    SetIntensity(u8),
}

/// Scriptable flash. Behaves like the real hardware: switching on lights the
/// flash at the configured level, switching off reports intensity 0, and
/// changing the level while off only records it for the next switch-on.
pub struct MockActuator {
    /// Current reported state.
    pub state: Cell<ActuatorState>,
    /// Level used on the next switch-on.
    pub level: Cell<u8>,
    /// Every call, in order.
    pub calls: RefCell<Vec<Call>>,
    /// If set, the hardware reports this intensity while lit instead of the
    /// configured level (e.g. a driver clamping to its own range).
    pub reported_level: Cell<Option<u8>>,
    /// If true, `get_enabled_intensity` fails with `Unavailable`.
    pub fail_get: Cell<bool>,
    /// If true, `set_enabled` fails with `InvalidState`.
    pub fail_set_enabled: Cell<bool>,
    /// If true, `set_intensity` fails with `InvalidState`.
    pub fail_set_intensity: Cell<bool>,
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockActuator {
    /// A flash that is off, with level 1 configured.
    pub fn new() -> Self {
        MockActuator {
            state: Cell::new(ActuatorState::UNKNOWN),
            level: Cell::new(1),
            calls: RefCell::new(Vec::new()),
            reported_level: Cell::new(None),
            fail_get: Cell::new(false),
            fail_set_enabled: Cell::new(false),
            fail_set_intensity: Cell::new(false),
        }
    }

    /// A flash that is already lit at `level`.
    pub fn lit(level: u8) -> Self {
        let mock = Self::new();
        mock.level.set(level);
        mock.state.set(ActuatorState {
            enabled: true,
            intensity: level,
        });
        mock
    }

    /// Configure the level the flash lights at, without recording a call.
    pub fn with_level(self, level: u8) -> Self {
        self.level.set(level);
        self
    }

    /// Number of `set_enabled(value)` calls so far.
    pub fn set_enabled_count(&self, value: bool) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|&&c| c == Call::SetEnabled(value))
            .count()
    }

    /// Calls other than reads.
    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .copied()
            .filter(|&c| c != Call::Get)
            .collect()
    }

    fn lit_level(&self) -> u8 {
        self.reported_level.get().unwrap_or(self.level.get())
    }
}

impl ActuatorClient for MockActuator {
    fn get_enabled_intensity(&self) -> Result<ActuatorState> {
        self.calls.borrow_mut().push(Call::Get);
        if self.fail_get.get() {
            return Err(ActuatorError::Unavailable(
                "mock: get failure injected".into(),
            ));
        }
        Ok(self.state.get())
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.calls.borrow_mut().push(Call::SetEnabled(enabled));
        if self.fail_set_enabled.get() {
            return Err(ActuatorError::InvalidState(
                "mock: set_enabled failure injected".into(),
            ));
        }
        let state = if enabled {
            ActuatorState {
                enabled: true,
                intensity: self.lit_level(),
            }
        } else {
            ActuatorState::UNKNOWN
        };
        self.state.set(state);
        Ok(())
    }

    fn set_intensity(&self, level: Intensity) -> Result<()> {
        self.calls.borrow_mut().push(Call::SetIntensity(level.get()));
        if self.fail_set_intensity.get() {
            return Err(ActuatorError::InvalidState(
                "mock: set_intensity failure injected".into(),
            ));
        }
        self.level.set(level.get());
        if self.state.get().enabled {
            self.state.set(ActuatorState {
                enabled: true,
                intensity: self.lit_level(),
            });
        }
        Ok(())
    }
}
