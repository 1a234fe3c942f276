//! `config` subcommand: show current configuration and file paths.

use std::path::Path;

use super::{Config, ConfigFilesJson, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());

    let state_file = config.state_file();
    let state_file_exists = state_file.as_ref().is_some_and(|p| p.exists());

    if json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            files: ConfigFilesJson {
                state_file: state_file.as_ref().map(|p| p.display().to_string()),
                state_file_exists,
            },
        });
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "led_path:",
            "policy_path:",
            "policy_poll_ms:",
            "call_timeout_ms:",
            "state_path:",
            "notifications_enabled:",
            "State file:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("led_path:", &config.led_path, w);
    kv_indent("policy_path:", &config.policy_path, w);
    kv_indent("policy_poll_ms:", config.policy_poll_ms, w);
    kv_indent("call_timeout_ms:", config.call_timeout_ms, w);
    let state_label = if config.state_path.trim().is_empty() {
        "(default)"
    } else {
        config.state_path.as_str()
    };
    kv_indent("state_path:", state_label, w);
    kv_indent("notifications_enabled:", config.notifications_enabled, w);
    println!();

    println!("Files:");
    match &state_file {
        Some(p) => {
            let status = if state_file_exists {
                "present"
            } else {
                "not found"
            };
            kv_indent("State file:", format_args!("{} ({status})", p.display()), w);
        }
        None => kv_indent("State file:", "(no config directory)", w),
    }
    Ok(())
}
