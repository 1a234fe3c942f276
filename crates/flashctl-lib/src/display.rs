//! Presentation-facing output: display snapshots and one-shot notices.

use std::fmt;
use std::sync::mpsc;

use serde::Serialize;

use crate::intensity::Intensity;

/// One selectable intensity level as the presentation should show it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntensityOption {
    pub level: Intensity,
    pub checked: bool,
    pub enabled: bool,
}

/// Everything the presentation needs to draw the flash controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub switch_checked: bool,
    pub switch_enabled: bool,
    pub intensity_options_enabled: bool,
    pub options: Vec<IntensityOption>,
    /// "On" or "Off".
    pub on_off_label: String,
    /// Current level as text, always `1`..`5`.
    pub intensity_label: String,
}

impl DisplayState {
    /// The checked option, if any.
    pub fn selected(&self) -> Option<Intensity> {
        self.options.iter().find(|o| o.checked).map(|o| o.level)
    }
}

/// One-shot user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Notice {
    /// The policy flag forces the flash on; local control is suspended.
    ExternallyManaged,
    /// No flash service is bound.
    ServiceUnavailable,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ExternallyManaged => {
                write!(f, "Flash is temporarily managed by another app")
            }
            Notice::ServiceUnavailable => write!(f, "Flash hardware is not available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Display(DisplayState),
    Notice(Notice),
}

/// Destination for controller output.
pub trait OutputSink {
    fn emit(&mut self, output: Output);
}

impl OutputSink for Vec<Output> {
    fn emit(&mut self, output: Output) {
        self.push(output);
    }
}

impl OutputSink for mpsc::Sender<Output> {
    fn emit(&mut self, output: Output) {
        if self.send(output).is_err() {
            log::debug!("presentation gone, dropping output");
        }
    }
}

/// The last display snapshot in a batch of outputs.
pub fn last_display(outputs: &[Output]) -> Option<&DisplayState> {
    outputs.iter().rev().find_map(|o| match o {
        Output::Display(d) => Some(d),
        Output::Notice(_) => None,
    })
}
