// ── Win32 feedback ────────────────────────────────────────────────────────────
//
// This is one of exactly two modules in the codebase where `unsafe` code is
// permitted (the other is `editor::scintilla`).  Every `unsafe` block MUST
// carry a `// SAFETY:` comment that states:
//   • which invariant makes the operation sound, and
//   • what the caller is responsible for maintaining.
//
// `MessageBoxNotifier` is the `Notifier` a plugin host hands to the engine:
// script errors become modal dialogs owned by the editor window and status
// lines are passed to a host callback that paints the status control.

#![allow(unsafe_code)]

use tracing::debug;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::HWND,
        UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK},
    },
};

use crate::{
    error::ScriptError,
    report::{Notifier, StatusLevel},
};

/// Paints one status line; receives the colour class and the text.
pub type StatusSink = Box<dyn FnMut(StatusLevel, &str)>;

/// Dialog-based `Notifier` for the plugin host.
pub struct MessageBoxNotifier {
    owner: HWND,
    sink: StatusSink,
}

impl MessageBoxNotifier {
    /// `owner` must stay a valid window (or null) while the notifier is used.
    pub fn new(owner: HWND, sink: StatusSink) -> Self {
        Self { owner, sink }
    }
}

impl Notifier for MessageBoxNotifier {
    fn status(&mut self, level: StatusLevel, message: &str) {
        (self.sink)(level, message);
    }

    fn script_error(&mut self, error: &ScriptError) {
        debug!(%error, "showing script error dialog");
        show_error_dialog(self.owner, dialog_title(error), &error.to_string());
    }
}

/// Caption of the script error dialog.
fn dialog_title(error: &ScriptError) -> &'static str {
    match error {
        ScriptError::Syntax { .. } => "Use Variables: Syntax Error",
        ScriptError::Runtime { .. } | ScriptError::NoResult { .. } => {
            "Use Variables: Execution Error"
        }
    }
}

/// Show a modal error dialog owned by `owner`.
///
/// Performs the UTF-16 conversion internally.
pub fn show_error_dialog(owner: HWND, title: &str, message: &str) {
    let msg_wide: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();
    let title_wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();

    // SAFETY: msg_wide and title_wide are valid null-terminated UTF-16 strings
    // that remain allocated for the duration of the MessageBoxW call.
    // `owner` is valid or null per the `MessageBoxNotifier::new` contract.
    // The button pressed carries no information for an OK-only dialog.
    unsafe {
        let _ = MessageBoxW(
            owner,
            PCWSTR(msg_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn titles_follow_error_kind() {
        let syntax = ScriptError::Syntax { template: "x".into(), message: "m".into() };
        let missing = ScriptError::NoResult { template: "x".into() };
        assert_eq!(dialog_title(&syntax), "Use Variables: Syntax Error");
        assert_eq!(dialog_title(&missing), "Use Variables: Execution Error");
    }

    #[test]
    fn status_goes_to_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut n = MessageBoxNotifier::new(
            HWND::default(),
            Box::new(move |level, text| log.borrow_mut().push((level, text.to_owned()))),
        );
        n.status(StatusLevel::Info, "2 occurrences were marked.");
        assert_eq!(seen.borrow()[0], (StatusLevel::Info, "2 occurrences were marked.".to_owned()));
    }
}
