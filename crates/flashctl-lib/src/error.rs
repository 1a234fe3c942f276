//! Crate-level error type.

use std::fmt;

use crate::actuator::ActuatorError;
use crate::policy::PolicyError;

/// Unified error for callers wiring the pieces together.
#[derive(Debug)]
pub enum FlashctlError {
    Actuator(ActuatorError),
    Policy(PolicyError),
    Io(std::io::Error),
    Config(String),
}

impl fmt::Display for FlashctlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashctlError::Actuator(e) => write!(f, "{e}"),
            FlashctlError::Policy(e) => write!(f, "{e}"),
            FlashctlError::Io(e) => write!(f, "I/O error: {e}"),
            FlashctlError::Config(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for FlashctlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlashctlError::Actuator(e) => Some(e),
            FlashctlError::Policy(e) => Some(e),
            FlashctlError::Io(e) => Some(e),
            FlashctlError::Config(_) => None,
        }
    }
}

impl From<ActuatorError> for FlashctlError {
    fn from(e: ActuatorError) -> Self {
        FlashctlError::Actuator(e)
    }
}

impl From<PolicyError> for FlashctlError {
    fn from(e: PolicyError) -> Self {
        FlashctlError::Policy(e)
    }
}

impl From<std::io::Error> for FlashctlError {
    fn from(e: std::io::Error) -> Self {
        FlashctlError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, FlashctlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_passes_through_inner_messages() {
        let e = FlashctlError::from(ActuatorError::Unavailable("brightness: gone".into()));
        assert_eq!(e.to_string(), "Flash service unavailable: brightness: gone");

        let e = FlashctlError::from(PolicyError::ReadFailed("denied".into()));
        assert_eq!(e.to_string(), "Policy read failed: denied");
    }

    #[test]
    fn config_error_has_no_source() {
        let e = FlashctlError::Config("policy_poll_ms must be greater than 0".into());
        assert_eq!(
            e.to_string(),
            "Invalid configuration: policy_poll_ms must be greater than 0"
        );
        assert!(e.source().is_none());
    }

    #[test]
    fn io_error_converts_with_question_mark() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/flashctl/state.toml")?)
        }
        let err = read_missing().unwrap_err();
        assert!(matches!(err, FlashctlError::Io(_)));
        assert!(err.source().is_some());
    }
}
