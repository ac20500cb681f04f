// ── User feedback ─────────────────────────────────────────────────────────────
//
// The engine never talks to a window directly.  Status-bar lines and script
// error dialogs go through a `Notifier`; the host supplies one that draws
// them, the command-line front end uses `TracingNotifier`.

use tracing::{error, info, warn};

use crate::error::ScriptError;

/// Status lines longer than this are cut and end in "...".
pub const MAX_STATUS_LEN: usize = 72;

/// Colour class of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Green: something was done.
    Success,
    /// Blue: neutral information such as a match count.
    Info,
    /// Red: nothing was done.
    Error,
}

impl StatusLevel {
    /// 0xRRGGBB text colour for the status line.
    pub fn color(self) -> u32 {
        match self {
            StatusLevel::Success => 0x00_80_00,
            StatusLevel::Info => 0x00_00_80,
            StatusLevel::Error => 0xFF_00_00,
        }
    }
}

/// Shorten `message` to `MAX_STATUS_LEN` characters.
pub fn truncate_status(message: &str) -> String {
    if message.chars().count() <= MAX_STATUS_LEN {
        return message.to_owned();
    }
    let mut out: String = message.chars().take(MAX_STATUS_LEN - 3).collect();
    out.push_str("...");
    out
}

/// Receives everything the engine wants the user to see.
pub trait Notifier {
    /// Replace the status line.  `message` is already truncated.
    fn status(&mut self, level: StatusLevel, message: &str);

    /// A template failed.  Hosts typically show a blocking dialog.
    fn script_error(&mut self, error: &ScriptError);
}

/// Sends all feedback to the `tracing` subscriber and remembers the last
/// status line.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    last: Option<(StatusLevel, String)>,
    script_errors: usize,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_status(&self) -> Option<(StatusLevel, &str)> {
        self.last.as_ref().map(|(l, m)| (*l, m.as_str()))
    }

    pub fn script_errors(&self) -> usize {
        self.script_errors
    }
}

impl Notifier for TracingNotifier {
    fn status(&mut self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Error => warn!("{message}"),
            _ => info!("{message}"),
        }
        self.last = Some((level, message.to_owned()));
    }

    fn script_error(&mut self, error: &ScriptError) {
        self.script_errors += 1;
        error!("{error}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
