//! Flash actuator access: the client trait, a sysfs backend and a bounded-call wrapper.

mod bounded;
pub mod mock;
mod sysfs;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::intensity::Intensity;

pub use bounded::BoundedActuator;
pub use sysfs::SysfsFlash;

// ── Error type ──

/// Actuator call errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the node or step and *details* the underlying failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// No service is bound or the node is missing.
    Unavailable(String),
    /// The hardware refused the operation in its current state.
    InvalidState(String),
    /// The call did not complete within the configured bound.
    Timeout(Duration),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::Unavailable(e) => write!(f, "Flash service unavailable: {e}"),
            ActuatorError::InvalidState(e) => write!(f, "Flash rejected the operation: {e}"),
            ActuatorError::Timeout(d) => write!(f, "Flash call timed out after {d:?}"),
        }
    }
}

impl std::error::Error for ActuatorError {}

pub type Result<T> = std::result::Result<T, ActuatorError>;

// ── State ──

/// What the hardware reports about itself.
///
/// `intensity` is the raw level as reported; it is only trusted once it
/// passes [`ActuatorState::level`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActuatorState {
    pub enabled: bool,
    pub intensity: u8,
}

impl ActuatorState {
    /// Placeholder for an unreachable or unreadable actuator.
    pub const UNKNOWN: ActuatorState = ActuatorState {
        enabled: false,
        intensity: 0,
    };

    /// The reported intensity, or `None` if it is outside `1..=5`.
    pub fn level(&self) -> Option<Intensity> {
        Intensity::new(i64::from(self.intensity))
    }
}

// ── Trait ──

/// Synchronous call boundary to the flash hardware service.
///
/// Implementations never retry; failures are returned to the caller as-is.
pub trait ActuatorClient {
    fn get_enabled_intensity(&self) -> Result<ActuatorState>;
    fn set_enabled(&self, enabled: bool) -> Result<()>;
    fn set_intensity(&self, level: Intensity) -> Result<()>;
}
