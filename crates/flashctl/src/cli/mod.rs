//! CLI subcommands: status, configuration, interactive session.

mod config_cmd;
mod session;
mod status;

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use flashctl_lib::FlashctlError;
pub(super) use flashctl_lib::actuator::{ActuatorClient, BoundedActuator, SysfsFlash};
pub(super) use flashctl_lib::config::Config;
pub(super) use flashctl_lib::error::Result;
pub(super) use flashctl_lib::policy::PolicyFlag;
use flashctl_lib::policy::read_flag_file;
pub(super) use flashctl_lib::store::{FileIntensityStore, IntensityStore};

const PADDING: usize = 2;

/// Alignment width for a command's key-value output: at least PADDING spaces
/// after the longest key, with indented values on the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w - 2));
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct StatusOutput {
    pub version: String,
    pub flash: FlashStatusJson,
    pub policy: PolicyStatusJson,
    pub saved_intensity: u8,
}

#[derive(Serialize)]
pub(super) struct FlashStatusJson {
    pub path: String,
    pub available: bool,
    pub enabled: Option<bool>,
    /// `None` when off or when the reading is outside 1-5.
    pub intensity: Option<u8>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub(super) struct PolicyStatusJson {
    pub path: String,
    pub flag: Option<PolicyFlag>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub files: ConfigFilesJson,
}

#[derive(Serialize)]
pub(super) struct ConfigFilesJson {
    pub state_file: Option<String>,
    pub state_file_exists: bool,
}

/// Pretty-print any output struct as JSON.
pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| FlashctlError::Config(format!("JSON serialization failed: {e}")))?;
    println!("{json_str}");
    Ok(())
}

#[derive(Subcommand)]
pub enum Command {
    /// Show flash, policy and saved intensity
    Status,

    /// Show current configuration and file paths
    Config,

    /// Run the controller interactively (commands on stdin, `help` to list)
    Session,
}

/// Load the config from `custom_path` or the default location, logging any
/// parse warnings and replacing invalid fields with defaults.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let (mut config, warnings) = match custom_path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    for w in warnings.iter().chain(config.sanitize().iter()) {
        log::warn!("[config] {w}");
    }
    config
}

/// Bind the configured LED node behind a call timeout.
pub(super) fn open_actuator(config: &Config) -> Result<BoundedActuator<SysfsFlash>> {
    let flash = SysfsFlash::open(&config.led_path)?;
    Ok(BoundedActuator::new(flash, config.call_timeout()))
}

pub(super) fn read_policy(config: &Config) -> Result<PolicyFlag> {
    Ok(read_flag_file(Path::new(&config.policy_path))?)
}

pub(super) fn open_store(config: &Config) -> Result<FileIntensityStore> {
    config.state_file().map(FileIntensityStore::new).ok_or_else(|| {
        FlashctlError::Config("no config directory for the state file; set state_path".into())
    })
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Status => status::cmd_status(json, config_path),
        Command::Config => config_cmd::cmd_config(json, config_path),
        Command::Session => session::cmd_session(json, config_path),
    }
}
