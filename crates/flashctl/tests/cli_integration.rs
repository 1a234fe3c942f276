//! Integration tests for the `flashctl` binary.
//!
//! Every test that touches hardware points the binary at a temporary config
//! whose LED node, policy flag and state file live in a temp directory.

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("flashctl")
}

/// Fake LED class node plus a config pointing at it.
struct Rig {
    dir: tempfile::TempDir,
    config: PathBuf,
}

impl Rig {
    fn new(max: u32, brightness: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let led = dir.path().join("led");
        std::fs::create_dir(&led).unwrap();
        std::fs::write(led.join("max_brightness"), format!("{max}\n")).unwrap();
        std::fs::write(led.join("brightness"), format!("{brightness}\n")).unwrap();

        let config = dir.path().join("config.toml");
        let toml = format!(
            "led_path = {:?}\npolicy_path = {:?}\nstate_path = {:?}\npolicy_poll_ms = 20\n",
            led.display().to_string(),
            dir.path().join("policy").display().to_string(),
            dir.path().join("state.toml").display().to_string(),
        );
        std::fs::write(&config, toml).unwrap();
        Rig { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn brightness(&self) -> u32 {
        read_trimmed(&self.path("led").join("brightness"))
            .parse()
            .unwrap()
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cli();
        cmd.arg("--config").arg(&self.config);
        cmd
    }
}

fn read_trimmed(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap().trim().to_string()
}

#[test]
fn cli_help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("flashctl"));
}

#[test]
fn cli_version_prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_session_help_succeeds() {
    cli()
        .args(["session", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stdin"));
}

#[test]
fn cli_config_json_produces_valid_json() {
    let output = cli()
        .args(["--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("config --json should produce valid JSON");
    assert!(json["settings"].is_object());
    assert!(json["config_file"].is_string() || json["config_file"].is_null());
}

#[test]
fn cli_verbose_flag_accepted() {
    cli().args(["-v", "config"]).assert().success();
    cli().args(["-vv", "config"]).assert().success();
}

#[test]
fn cli_config_reports_custom_file() {
    let rig = Rig::new(255, 0);
    let output = rig
        .cmd()
        .args(["--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["config_file_exists"], true);
    assert_eq!(json["settings"]["policy_poll_ms"], 20);
    assert_eq!(json["files"]["state_file_exists"], false);
}

#[test]
fn cli_status_json_reads_all_sources() {
    let rig = Rig::new(255, 153);
    std::fs::write(rig.path("policy"), "1\n").unwrap();
    std::fs::write(rig.path("state.toml"), "flash_intensity = 4\n").unwrap();

    let output = rig
        .cmd()
        .args(["--json", "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["flash"]["available"], true);
    assert_eq!(json["flash"]["enabled"], true);
    assert_eq!(json["flash"]["intensity"], 3);
    assert_eq!(json["policy"]["flag"], "forced-on");
    assert_eq!(json["saved_intensity"], 4);
}

#[test]
fn cli_status_without_flash_still_succeeds() {
    let rig = Rig::new(255, 0);
    std::fs::remove_dir_all(rig.path("led")).unwrap();
    rig.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error:"));
}

#[test]
fn cli_session_applies_commands_and_switches_off_on_exit() {
    let rig = Rig::new(255, 0);
    rig.cmd()
        .arg("session")
        .write_stdin("on\nlevel 4\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("intensity 4"));

    assert_eq!(rig.brightness(), 0, "leaving the session switches the flash off");
    assert_eq!(read_trimmed(&rig.path("state.toml")), "flash_intensity = 4");
}

#[test]
fn cli_session_leaves_forced_flash_lit() {
    let rig = Rig::new(255, 102);
    std::fs::write(rig.path("policy"), "1").unwrap();
    rig.cmd()
        .args(["--json", "session"])
        .write_stdin("off\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"switch_enabled\":false"));

    assert_eq!(rig.brightness(), 102);
}

#[test]
fn cli_session_rejects_bad_input() {
    let rig = Rig::new(255, 0);
    rig.cmd()
        .arg("session")
        .write_stdin("level 9\nblink\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("out of range"))
        .stderr(predicate::str::contains("unknown command"));
    assert!(!rig.path("state.toml").exists());
}
