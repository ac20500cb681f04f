// ── Editor component abstraction ──────────────────────────────────────────────
//
// The engine never talks to an editor control directly.  Everything it needs
// from the host document goes through the `TextBuffer` trait below, which has
// two implementations:
//
//   • `memory::MemoryBuffer`      – in-process buffer (CLI, tests)
//   • `scintilla::ScintillaBuffer` – a host-owned Scintilla window (Windows)
//
// Positions are byte offsets into the UTF-8 document, lines are 0-based.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::error::Result;

pub mod memory;
#[cfg(windows)]
pub mod scintilla;

// ── EOL mode ──────────────────────────────────────────────────────────────────

/// The end-of-line convention used by the document.
///
/// Matches Scintilla's `SC_EOL_*` constants (read via `SCI_GETEOLMODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolMode {
    /// Windows-style `\r\n` (Scintilla: `SC_EOL_CRLF = 0`).
    Crlf,
    /// Unix-style `\n` (Scintilla: `SC_EOL_LF = 2`).
    Lf,
    /// Old Mac-style `\r` (Scintilla: `SC_EOL_CR = 1`).
    Cr,
}

impl EolMode {
    /// Short display string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crlf => "CRLF",
            Self::Lf => "LF",
            Self::Cr => "CR",
        }
    }

    /// Byte length of one line terminator.
    pub fn len(self) -> usize {
        match self {
            Self::Crlf => 2,
            Self::Lf | Self::Cr => 1,
        }
    }

    /// The terminator bytes themselves.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Crlf => b"\r\n",
            Self::Lf => b"\n",
            Self::Cr => b"\r",
        }
    }

    /// Detect the dominant EOL style in UTF-8 text.
    ///
    /// Scans for `\r\n`, `\r`, and `\n` and returns whichever appears most.
    /// Falls back to `EolMode::Crlf` when no line endings are present.
    pub fn detect(utf8: &[u8]) -> EolMode {
        let mut crlf = 0usize;
        let mut lf = 0usize;
        let mut cr = 0usize;
        let mut i = 0;
        while i < utf8.len() {
            match utf8[i] {
                b'\r' if utf8.get(i + 1) == Some(&b'\n') => {
                    crlf += 1;
                    i += 2;
                }
                b'\r' => {
                    cr += 1;
                    i += 1;
                }
                b'\n' => {
                    lf += 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        if crlf >= lf && crlf >= cr {
            EolMode::Crlf
        } else if lf >= cr {
            EolMode::Lf
        } else {
            EolMode::Cr
        }
    }
}

// ── Search flags ──────────────────────────────────────────────────────────────

/// Flags for a single `search_in_range` call.
///
/// The Scintilla adapter maps these onto `SCFIND_WHOLEWORD`,
/// `SCFIND_MATCHCASE` and `SCFIND_REGEXP`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFlags {
    pub whole_word: bool,
    pub match_case: bool,
    pub regex: bool,
}

// ── Ranges ────────────────────────────────────────────────────────────────────

/// A half-open `[start, end)` byte range; `start <= end` by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    /// Build a range from two endpoints in either order.
    pub fn new(a: usize, b: usize) -> Self {
        Self { start: a.min(b), end: a.max(b) }
    }

    /// A zero-width range (a caret).
    pub fn caret(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A search target in Scintilla's convention: `start > end` searches backward
/// from `start` towards `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub start: usize,
    pub end: usize,
}

impl Target {
    pub fn forward(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Search leftward from `from` down to `to`.
    pub fn backward(from: usize, to: usize) -> Self {
        Self { start: from, end: to }
    }

    pub fn is_backward(&self) -> bool {
        self.start > self.end
    }

    /// The covered bytes as an ordinary ascending range.
    pub fn span(&self) -> SelectionRange {
        SelectionRange::new(self.start, self.end)
    }
}

// ── Change notifications ──────────────────────────────────────────────────────

/// Whether a modification inserted or removed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Insert,
    Delete,
}

/// One buffer-change notification (Scintilla's `SCN_MODIFIED`).
///
/// `line` is the line containing `position` *after* the edit was applied,
/// which is what `SCI_LINEFROMPOSITION` reports while the notification is
/// being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationKind,
    pub position: usize,
    pub length: usize,
    /// Signed line delta; negative for deletions spanning line breaks.
    pub lines_added: isize,
    pub line: usize,
}

/// Queue shared between a host's notification handler and a buffer adapter.
///
/// The host pushes while the engine may be inside a buffer call, so this is
/// a `RefCell` rather than a `&mut` handed through the call stack.
pub type ModificationQueue = Rc<RefCell<VecDeque<Modification>>>;

// ── TextBuffer ────────────────────────────────────────────────────────────────

/// The capability set the engine needs from a host document.
pub trait TextBuffer {
    // ── Geometry ──────────────────────────────────────────────────────────────

    /// Byte length of the document.
    fn length(&self) -> usize;
    /// Number of lines (always >= 1).
    fn line_count(&self) -> usize;
    fn line_from_position(&self, pos: usize) -> usize;
    fn position_from_line(&self, line: usize) -> usize;
    /// Position just before the line terminator of `line`.
    fn line_end_position(&self, line: usize) -> usize;
    fn eol_mode(&self) -> EolMode;

    fn is_read_only(&self) -> bool {
        false
    }

    // ── Content ───────────────────────────────────────────────────────────────

    fn text_range(&self, start: usize, end: usize) -> Vec<u8>;

    /// Content of `line` without its terminator.
    fn line_text(&self, line: usize) -> Vec<u8> {
        self.text_range(self.position_from_line(line), self.line_end_position(line))
    }

    // ── Search ────────────────────────────────────────────────────────────────

    /// Find `pattern` inside `target`, returning `(position, length)`.
    ///
    /// Errors only when the regex capability rejects the pattern.
    fn search_in_range(
        &mut self,
        pattern: &[u8],
        flags: SearchFlags,
        target: Target,
    ) -> Result<Option<(usize, usize)>>;

    /// Capture group `group` (1-based) of the last regex match, or `None`
    /// once the group number exceeds what the regex engine reports.
    fn capture(&self, group: usize) -> Option<Vec<u8>>;

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Replace `[start, end)` with `text`; returns the new end position.
    fn replace_range(&mut self, start: usize, end: usize, text: &[u8]) -> usize;

    /// Like `replace_range`, but back-references in `template` are expanded
    /// from the last regex match.
    fn replace_range_regex(&mut self, start: usize, end: usize, template: &[u8]) -> usize;

    fn begin_undo_action(&mut self) {}
    fn end_undo_action(&mut self) {}

    /// Drain change notifications recorded since the last call.
    fn take_modifications(&mut self) -> Vec<Modification> {
        Vec::new()
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    /// All selections, in the order the host reports them.
    fn selections(&self) -> Vec<SelectionRange>;

    /// The main selection.
    fn main_selection(&self) -> SelectionRange {
        self.selections().first().copied().unwrap_or_default()
    }

    /// Caret position.
    fn current_position(&self) -> usize {
        self.main_selection().end
    }

    /// Replace all selections with `range` as the single main selection.
    fn set_selection(&mut self, range: SelectionRange);

    // ── Highlights (Scintilla indicators) ────────────────────────────────────

    /// Configure `style` to paint in `color` (`0xRRGGBB`).
    fn define_highlight(&mut self, style: usize, color: u32);
    fn apply_highlight(&mut self, style: usize, start: usize, len: usize);
    fn clear_highlight(&mut self, style: usize, start: usize, len: usize);
    fn highlight_value_at(&self, style: usize, pos: usize) -> bool;

    /// End of the run of equal `style` values containing `pos`.
    fn highlight_end(&self, style: usize, pos: usize) -> usize {
        let len = self.length();
        if pos >= len {
            return len;
        }
        let value = self.highlight_value_at(style, pos);
        let mut end = pos + 1;
        while end < len && self.highlight_value_at(style, end) == value {
            end += 1;
        }
        end
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eol_display_and_len() {
        assert_eq!(EolMode::Crlf.as_str(), "CRLF");
        assert_eq!(EolMode::Lf.as_str(), "LF");
        assert_eq!(EolMode::Cr.as_str(), "CR");
        assert_eq!(EolMode::Crlf.len(), 2);
        assert_eq!(EolMode::Cr.len(), 1);
    }

    #[test]
    fn detect_eol_crlf_dominant() {
        assert_eq!(EolMode::detect(b"a\r\nb\r\nc\n"), EolMode::Crlf);
    }

    #[test]
    fn detect_eol_lf_dominant() {
        assert_eq!(EolMode::detect(b"a\nb\nc\n"), EolMode::Lf);
    }

    #[test]
    fn detect_eol_no_newlines_defaults_crlf() {
        assert_eq!(EolMode::detect(b"no newlines here"), EolMode::Crlf);
    }

    #[test]
    fn selection_range_normalises_order() {
        let r = SelectionRange::new(8, 5);
        assert_eq!((r.start, r.end, r.len()), (5, 8, 3));
    }

    #[test]
    fn target_direction() {
        assert!(Target::backward(10, 0).is_backward());
        assert!(!Target::forward(0, 10).is_backward());
        assert_eq!(Target::backward(10, 4).span(), SelectionRange::new(4, 10));
    }
}
