//! `session` subcommand: run the controller in the foreground and feed it
//! commands read from stdin.
//!
//! Leaving the session (quit, end of input, Ctrl+C) behaves like the
//! controlling view going away: the controller gets a scope exit, which
//! switches a lit flash off unless the policy forces it on, then teardown.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use serde::Serialize;

use flashctl_lib::controller::{Event, SyncController};
use flashctl_lib::dispatch;
use flashctl_lib::display::{DisplayState, Notice, Output};
use flashctl_lib::intensity::Intensity;
use flashctl_lib::policy::FilePolicy;

use super::{RUNNING, Result, open_actuator, open_store};

/// How often the input loop checks the shutdown flag.
const INPUT_POLL: Duration = Duration::from_millis(100);

const HELP: &str = "\
commands:
  on | off     flip the switch
  level <1-5>  pick an intensity
  hide | show  leave or re-enter the foreground
  help         show this list
  quit         exit (switches a lit flash off unless forced)";

/// One parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum SessionInput {
    Event(Event),
    Help,
    Quit,
    Empty,
}

fn parse_command(line: &str) -> std::result::Result<SessionInput, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(SessionInput::Empty);
    };
    let input = match cmd.to_ascii_lowercase().as_str() {
        "on" => SessionInput::Event(Event::Toggle(true)),
        "off" => SessionInput::Event(Event::Toggle(false)),
        "level" => {
            let arg = words
                .next()
                .ok_or_else(|| "usage: level <1-5>".to_string())?;
            let raw: i64 = arg
                .parse()
                .map_err(|_| format!("not a number: {arg}"))?;
            let level = Intensity::try_from(raw).map_err(|e| e.to_string())?;
            SessionInput::Event(Event::SelectIntensity(i64::from(level.get())))
        }
        "hide" => SessionInput::Event(Event::ScopeExit),
        "show" => SessionInput::Event(Event::ScopeEnter),
        "help" | "?" => SessionInput::Help,
        "quit" | "exit" | "q" => SessionInput::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    match words.next() {
        Some(extra) => Err(format!("unexpected argument: {extra}")),
        None => Ok(input),
    }
}

/// Single-line human rendering of a display snapshot.
fn display_line(d: &DisplayState) -> String {
    let switch = if d.switch_checked { "[x]" } else { "[ ]" };
    let lock = if d.switch_enabled { "" } else { " locked" };
    let levels: Vec<String> = d
        .options
        .iter()
        .map(|o| {
            if o.checked {
                format!("({})", o.level)
            } else {
                o.level.to_string()
            }
        })
        .collect();
    let levels_state = if d.intensity_options_enabled {
        ""
    } else {
        " (disabled)"
    };
    format!(
        "switch {switch}{lock}  flash {}  intensity {}  levels {}{levels_state}",
        d.on_off_label,
        d.intensity_label,
        levels.join(" ")
    )
}

#[derive(Serialize)]
struct NoticeJson<'a> {
    notice: &'a Notice,
    message: String,
}

fn show_notification(body: &str) {
    let mut n = notify_rust::Notification::new();
    n.summary("flashctl");
    n.body(body);
    if let Err(e) = n.show() {
        log::debug!("notification failed: {e}");
    }
}

fn render(output: &Output, json: bool, notify: bool) {
    let line = match output {
        Output::Display(d) if json => serde_json::to_string(d),
        Output::Display(d) => Ok(display_line(d)),
        Output::Notice(n) if json => serde_json::to_string(&NoticeJson {
            notice: n,
            message: n.to_string(),
        }),
        Output::Notice(n) => Ok(format!("! {n}")),
    };
    match line {
        Ok(line) => println!("{line}"),
        Err(e) => log::warn!("could not render output: {e}"),
    }
    if notify && let Output::Notice(n) = output {
        show_notification(&n.to_string());
    }
}

/// Read stdin lines on a helper thread. The channel closes at end of input.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin: {e}");
                    break;
                }
            }
        }
    });
    rx
}

pub(super) fn cmd_session(json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path);
    let store = open_store(&config)?;
    let actuator = match open_actuator(&config) {
        Ok(a) => Some(a),
        Err(e) => {
            log::warn!("[flash] {e}");
            None
        }
    };
    let policy = FilePolicy::new(&config.policy_path, config.policy_poll_interval());

    let (out_tx, out_rx) = mpsc::channel::<Output>();
    let notify = config.notifications_enabled;
    let renderer = std::thread::spawn(move || {
        for output in out_rx {
            render(&output, json, notify);
        }
    });

    let handle = dispatch::spawn(SyncController::new(actuator, policy, store), out_tx);
    if !json {
        eprintln!("type `help` for commands");
    }

    let input = spawn_stdin_reader();
    while RUNNING.load(Ordering::SeqCst) {
        let line = match input.recv_timeout(INPUT_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match parse_command(&line) {
            Ok(SessionInput::Event(event)) => {
                if !handle.send(event) {
                    log::warn!("controller stopped, ending session");
                    break;
                }
            }
            Ok(SessionInput::Help) => eprintln!("{HELP}"),
            Ok(SessionInput::Quit) => break,
            Ok(SessionInput::Empty) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }

    handle.send(Event::ScopeExit);
    let controller = handle.shutdown();
    log::info!("session ended ({})", controller.lifecycle());
    drop(controller);

    if renderer.join().is_err() {
        log::warn!("output thread panicked");
    }
    Ok(())
}
