//! `status` subcommand: one-shot look at the flash, the policy flag and the
//! saved intensity. Does not change anything.

use std::path::Path;

use super::{
    ActuatorClient, Config, FileIntensityStore, FlashStatusJson, IntensityStore, PolicyStatusJson,
    Result, StatusOutput, kv, kv_indent, kv_width, open_actuator, print_json, read_policy,
};

fn collect_flash_status(config: &Config) -> FlashStatusJson {
    let reading = open_actuator(config).and_then(|flash| Ok(flash.get_enabled_intensity()?));
    match reading {
        Ok(state) => FlashStatusJson {
            path: config.led_path.clone(),
            available: true,
            enabled: Some(state.enabled),
            intensity: state.level().map(|l| l.get()),
            error: None,
        },
        Err(e) => FlashStatusJson {
            path: config.led_path.clone(),
            available: false,
            enabled: None,
            intensity: None,
            error: Some(e.to_string()),
        },
    }
}

fn collect_policy_status(config: &Config) -> PolicyStatusJson {
    let (flag, error) = match read_policy(config) {
        Ok(flag) => (Some(flag), None),
        Err(e) => (None, Some(e.to_string())),
    };
    PolicyStatusJson {
        path: config.policy_path.clone(),
        flag,
        error,
    }
}

pub(super) fn cmd_status(json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path);
    let flash = collect_flash_status(&config);
    let policy = collect_policy_status(&config);
    let saved = config
        .state_file()
        .map(|p| FileIntensityStore::new(p).get())
        .unwrap_or_default();

    if json {
        return print_json(&StatusOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            flash,
            policy,
            saved_intensity: saved.get(),
        });
    }

    let w = kv_width(
        &["Version:", "Flash:", "Policy:", "Saved intensity:"],
        &["Path:", "State:", "Intensity:", "Flag:", "Error:"],
    );

    kv("Version:", env!("CARGO_PKG_VERSION"), w);
    println!();

    println!("Flash:");
    kv_indent("Path:", &flash.path, w);
    match (flash.enabled, &flash.error) {
        (Some(enabled), _) => {
            kv_indent("State:", if enabled { "on" } else { "off" }, w);
            match flash.intensity {
                Some(level) => kv_indent("Intensity:", level, w),
                None if enabled => kv_indent("Intensity:", "(out of range)", w),
                None => {}
            }
        }
        (None, Some(e)) => kv_indent("Error:", e, w),
        (None, None) => kv_indent("State:", "unknown", w),
    }
    println!();

    println!("Policy:");
    kv_indent("Path:", &policy.path, w);
    match (policy.flag, &policy.error) {
        (Some(flag), _) => kv_indent("Flag:", flag, w),
        (None, Some(e)) => kv_indent("Error:", e, w),
        (None, None) => kv_indent("Flag:", "unknown", w),
    }
    println!();

    kv("Saved intensity:", saved, w);
    Ok(())
}
