//! Application configuration (TOML, platform-aware paths).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# flashctl configuration. Changes made outside the app may be overwritten.\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// LED class directory of the flash. Default: "/sys/class/leds/flash".
    #[serde(default = "default_led_path")]
    pub led_path: String,

    /// File holding the external policy flag (`0` = off, `1` = forced on).
    /// A missing file means off. Default: "/run/flashctl/policy".
    #[serde(default = "default_policy_path")]
    pub policy_path: String,

    /// How often the policy flag is polled, in milliseconds. Default: 250.
    #[serde(default = "default_policy_poll_ms")]
    pub policy_poll_ms: u64,

    /// Upper bound for a single flash call, in milliseconds. Default: 1000.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Where the saved intensity lives. Empty = `state.toml` next to the config.
    #[serde(default)]
    pub state_path: String,

    /// Show notices (e.g. "externally managed") as desktop notifications.
    #[serde(default)]
    pub notifications_enabled: bool,
}

fn default_led_path() -> String {
    "/sys/class/leds/flash".into()
}
fn default_policy_path() -> String {
    "/run/flashctl/policy".into()
}
fn default_policy_poll_ms() -> u64 {
    250
}
fn default_call_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            led_path: default_led_path(),
            policy_path: default_policy_path(),
            policy_poll_ms: default_policy_poll_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            state_path: String::new(),
            notifications_enabled: false,
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required path field is empty or whitespace-only.
    EmptyPath(&'static str),
    /// A millisecond field is zero.
    ZeroDuration(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyPath(field) => write!(f, "{field} cannot be empty"),
            ValidationError::ZeroDuration(field) => write!(f, "{field} must be greater than 0"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("flashctl"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Where the saved intensity is stored: `state_path` if set, otherwise
    /// `state.toml` in the config directory.
    pub fn state_file(&self) -> Option<PathBuf> {
        let custom = self.state_path.trim();
        if custom.is_empty() {
            Self::dir().map(|d| d.join("state.toml"))
        } else {
            Some(PathBuf::from(custom))
        }
    }

    pub fn policy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.policy_poll_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Save config to an arbitrary path atomically.
    ///
    /// A header comment is prepended to warn that manual edits may be overwritten.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        write_atomic(path, &format!("{CONFIG_HEADER}{serialized}"))
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.led_path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath("led_path"));
        }
        if self.policy_path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath("policy_path"));
        }
        if self.policy_poll_ms == 0 {
            errors.push(ValidationError::ZeroDuration("policy_poll_ms"));
        }
        if self.call_timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration("call_timeout_ms"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Replace invalid fields with their defaults, returning a warning for each.
    pub fn sanitize(&mut self) -> Vec<String> {
        let Err(errors) = self.validate() else {
            return vec![];
        };
        let defaults = Config::default();
        for e in &errors {
            match e {
                ValidationError::EmptyPath("led_path") => self.led_path = defaults.led_path.clone(),
                ValidationError::EmptyPath(_) => self.policy_path = defaults.policy_path.clone(),
                ValidationError::ZeroDuration("policy_poll_ms") => {
                    self.policy_poll_ms = defaults.policy_poll_ms
                }
                ValidationError::ZeroDuration(_) => self.call_timeout_ms = defaults.call_timeout_ms,
            }
        }
        errors
            .iter()
            .map(|e| format!("{e}, using default"))
            .collect()
    }
}

/// Write `contents` to `path` atomically (temp file, then rename).
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Rename can fail across filesystems; fall back to direct write + cleanup
            let result = std::fs::write(path, contents);
            let _ = std::fs::remove_file(&tmp);
            result
        }
    }
}
