// ── Scintilla buffer adapter ──────────────────────────────────────────────────
//
// This is one of exactly two modules where `unsafe` is permitted.
// Every `unsafe` block MUST carry a `// SAFETY:` comment.
//
// ── Ownership model ───────────────────────────────────────────────────────────
//
// The host editor creates and destroys the Scintilla window.  A
// `ScintillaBuffer` only borrows its `HWND` for the duration of one engine
// session and never sends WM_DESTROY or frees anything.  The host must drop
// the buffer (or switch it with `set_hwnd`) before the window goes away.
//
// Change notifications arrive through the host's WM_NOTIFY handler, not
// through this type.  The handler forwards `SCN_MODIFIED` to `on_modified`,
// which appends to a shared queue that `take_modifications` drains.

#![allow(unsafe_code)]

pub mod messages;

use messages::{
    HIGHLIGHT_ALPHA, INDIC_STRAIGHTBOX, SCFIND_MATCHCASE, SCFIND_POSIX, SCFIND_REGEXP,
    SCFIND_WHOLEWORD, SCI_BEGINUNDOACTION, SCI_ENDUNDOACTION, SCI_GETEOLMODE, SCI_GETLENGTH,
    SCI_GETLINECOUNT, SCI_GETLINEENDPOSITION, SCI_GETMAINSELECTION, SCI_GETREADONLY,
    SCI_GETSELECTIONNEND, SCI_GETSELECTIONNSTART, SCI_GETSELECTIONS, SCI_GETTAG,
    SCI_GETTARGETEND, SCI_GETTARGETSTART, SCI_GETTEXTRANGEFULL, SCI_INDICATORCLEARRANGE,
    SCI_INDICATOREND, SCI_INDICATORFILLRANGE, SCI_INDICATORVALUEAT, SCI_INDICSETALPHA,
    SCI_INDICSETFORE, SCI_INDICSETSTYLE, SCI_LINEFROMPOSITION, SCI_POSITIONFROMLINE,
    SCI_REPLACETARGET, SCI_REPLACETARGETRE, SCI_SEARCHINTARGET, SCI_SETINDICATORCURRENT,
    SCI_SETSEARCHFLAGS, SCI_SETSEL, SCI_SETTARGETRANGE, SC_EOL_CR, SC_EOL_CRLF, SC_EOL_LF,
    SC_MOD_DELETETEXT, SC_MOD_INSERTTEXT,
};
use tracing::{trace, warn};
use windows::Win32::{
    Foundation::{HWND, LPARAM, WPARAM},
    UI::WindowsAndMessaging::SendMessageW,
};

use super::{
    EolMode, Modification, ModificationKind, ModificationQueue, SearchFlags, SelectionRange,
    Target, TextBuffer,
};
use crate::error::{Error, Result};

/// `Sci_CharacterRangeFull` from Scintilla.h.
#[repr(C)]
struct CharacterRangeFull {
    cp_min: isize,
    cp_max: isize,
}

/// `Sci_TextRangeFull` from Scintilla.h.
#[repr(C)]
struct TextRangeFull {
    chrg: CharacterRangeFull,
    lpstr_text: *mut u8,
}

// ── ScintillaBuffer ───────────────────────────────────────────────────────────

/// A `TextBuffer` over a Scintilla window owned by the host editor.
pub struct ScintillaBuffer {
    hwnd: HWND,
    queue: ModificationQueue,
    /// Last pattern handed to `SCI_SEARCHINTARGET`; `SCI_GETTAG` refers to it.
    last_regex: bool,
}

impl ScintillaBuffer {
    /// Wrap the host's Scintilla window.
    ///
    /// `hwnd` must be a live Scintilla control for as long as this buffer is
    /// used.
    pub fn new(hwnd: HWND) -> Self {
        Self { hwnd, queue: ModificationQueue::default(), last_regex: false }
    }

    /// The host switched to another editor view.
    pub fn set_hwnd(&mut self, hwnd: HWND) {
        self.hwnd = hwnd;
        self.queue.borrow_mut().clear();
        self.last_regex = false;
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// A handle for the host's notification handler.
    pub fn queue(&self) -> ModificationQueue {
        ModificationQueue::clone(&self.queue)
    }

    /// Forward the fields of an `SCN_MODIFIED` notification.
    ///
    /// Anything that is not a text insertion or deletion is ignored.
    pub fn on_modified(&self, modification_type: i32, position: isize, length: isize, lines_added: isize) {
        let kind = if modification_type & SC_MOD_INSERTTEXT != 0 {
            ModificationKind::Insert
        } else if modification_type & SC_MOD_DELETETEXT != 0 {
            ModificationKind::Delete
        } else {
            return;
        };
        let position = position.max(0) as usize;
        let change = Modification {
            kind,
            position,
            length: length.max(0) as usize,
            lines_added,
            line: self.line_from_position(position),
        };
        trace!(?change, "scintilla modification");
        self.queue.borrow_mut().push_back(change);
    }

    // ── Raw message helpers ───────────────────────────────────────────────────

    fn send(&self, msg: u32, wparam: usize, lparam: isize) -> isize {
        // SAFETY: hwnd is a live Scintilla window (constructor contract) and
        // every message sent through this helper takes plain integers.
        unsafe { SendMessageW(self.hwnd, msg, WPARAM(wparam), LPARAM(lparam)).0 }
    }

    fn send_usize(&self, msg: u32, wparam: usize, lparam: isize) -> usize {
        self.send(msg, wparam, lparam).max(0) as usize
    }

    /// Send a message whose LPARAM points at `bytes` and WPARAM is its length.
    fn send_bytes(&self, msg: u32, bytes: &[u8]) -> isize {
        // SAFETY: hwnd is live; Scintilla reads exactly `bytes.len()` bytes
        // from the pointer, which stays valid for the synchronous call.
        unsafe {
            SendMessageW(self.hwnd, msg, WPARAM(bytes.len()), LPARAM(bytes.as_ptr() as isize)).0
        }
    }

    fn set_target(&self, start: usize, end: usize) {
        self.send(SCI_SETTARGETRANGE, start, end as isize);
    }
}

/// `0xRRGGBB` to Win32 `COLORREF` (`0x00BBGGRR`).
fn colorref(rgb: u32) -> isize {
    let r = (rgb >> 16) & 0xFF;
    let g = (rgb >> 8) & 0xFF;
    let b = rgb & 0xFF;
    ((b << 16) | (g << 8) | r) as isize
}

fn search_flags(flags: SearchFlags) -> usize {
    let mut bits = 0;
    if flags.whole_word {
        bits |= SCFIND_WHOLEWORD;
    }
    if flags.match_case {
        bits |= SCFIND_MATCHCASE;
    }
    if flags.regex {
        bits |= SCFIND_REGEXP | SCFIND_POSIX;
    }
    bits
}

impl TextBuffer for ScintillaBuffer {
    fn length(&self) -> usize {
        self.send_usize(SCI_GETLENGTH, 0, 0)
    }

    fn line_count(&self) -> usize {
        self.send_usize(SCI_GETLINECOUNT, 0, 0).max(1)
    }

    fn line_from_position(&self, pos: usize) -> usize {
        self.send_usize(SCI_LINEFROMPOSITION, pos, 0)
    }

    fn position_from_line(&self, line: usize) -> usize {
        // -1 past the last line; clamp to the document end like MemoryBuffer.
        match self.send(SCI_POSITIONFROMLINE, line, 0) {
            p if p < 0 => self.length(),
            p => p as usize,
        }
    }

    fn line_end_position(&self, line: usize) -> usize {
        self.send_usize(SCI_GETLINEENDPOSITION, line, 0)
    }

    fn eol_mode(&self) -> EolMode {
        match self.send(SCI_GETEOLMODE, 0, 0) {
            SC_EOL_LF => EolMode::Lf,
            SC_EOL_CR => EolMode::Cr,
            SC_EOL_CRLF => EolMode::Crlf,
            other => {
                warn!(other, "unknown EOL mode, assuming CRLF");
                EolMode::Crlf
            }
        }
    }

    fn is_read_only(&self) -> bool {
        self.send(SCI_GETREADONLY, 0, 0) != 0
    }

    fn text_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.length());
        if start >= end {
            return Vec::new();
        }
        let mut buf = vec![0u8; end - start + 1];
        let mut range = TextRangeFull {
            chrg: CharacterRangeFull { cp_min: start as isize, cp_max: end as isize },
            lpstr_text: buf.as_mut_ptr(),
        };
        // SAFETY: hwnd is live; `buf` holds `end - start + 1` bytes as
        // SCI_GETTEXTRANGEFULL requires, and `range` outlives the call.
        let copied = unsafe {
            SendMessageW(
                self.hwnd,
                SCI_GETTEXTRANGEFULL,
                WPARAM(0),
                LPARAM(&mut range as *mut TextRangeFull as isize),
            )
            .0
        };
        buf.truncate(copied.max(0) as usize);
        buf
    }

    fn search_in_range(
        &mut self,
        pattern: &[u8],
        flags: SearchFlags,
        target: Target,
    ) -> Result<Option<(usize, usize)>> {
        self.send(SCI_SETSEARCHFLAGS, search_flags(flags), 0);
        self.set_target(target.start, target.end);
        self.last_regex = flags.regex;
        match self.send_bytes(SCI_SEARCHINTARGET, pattern) {
            -2 => Err(Error::InvalidPattern(String::from_utf8_lossy(pattern).into_owned())),
            p if p < 0 => Ok(None),
            _ => {
                let start = self.send_usize(SCI_GETTARGETSTART, 0, 0);
                let end = self.send_usize(SCI_GETTARGETEND, 0, 0);
                Ok(Some((start, end.saturating_sub(start))))
            }
        }
    }

    fn capture(&self, group: usize) -> Option<Vec<u8>> {
        if !self.last_regex {
            return None;
        }
        let len = self.send(SCI_GETTAG, group, 0);
        if len <= 0 {
            return None;
        }
        let mut buf = vec![0u8; len as usize + 1];
        // SAFETY: hwnd is live; the first call reported `len` and `buf` has
        // room for that many bytes plus the terminating null.
        let copied = unsafe {
            SendMessageW(self.hwnd, SCI_GETTAG, WPARAM(group), LPARAM(buf.as_mut_ptr() as isize)).0
        };
        buf.truncate(copied.clamp(0, len) as usize);
        Some(buf)
    }

    fn replace_range(&mut self, start: usize, end: usize, text: &[u8]) -> usize {
        self.set_target(start, end);
        let written = self.send_bytes(SCI_REPLACETARGET, text);
        start + written.max(0) as usize
    }

    fn replace_range_regex(&mut self, start: usize, end: usize, template: &[u8]) -> usize {
        self.set_target(start, end);
        let written = self.send_bytes(SCI_REPLACETARGETRE, template);
        start + written.max(0) as usize
    }

    fn begin_undo_action(&mut self) {
        self.send(SCI_BEGINUNDOACTION, 0, 0);
    }

    fn end_undo_action(&mut self) {
        self.send(SCI_ENDUNDOACTION, 0, 0);
    }

    fn take_modifications(&mut self) -> Vec<Modification> {
        self.queue.borrow_mut().drain(..).collect()
    }

    fn selections(&self) -> Vec<SelectionRange> {
        let count = self.send_usize(SCI_GETSELECTIONS, 0, 0);
        (0..count)
            .map(|n| {
                let start = self.send_usize(SCI_GETSELECTIONNSTART, n, 0);
                let end = self.send_usize(SCI_GETSELECTIONNEND, n, 0);
                SelectionRange::new(start, end)
            })
            .collect()
    }

    fn main_selection(&self) -> SelectionRange {
        let main = self.send_usize(SCI_GETMAINSELECTION, 0, 0);
        let start = self.send_usize(SCI_GETSELECTIONNSTART, main, 0);
        let end = self.send_usize(SCI_GETSELECTIONNEND, main, 0);
        SelectionRange::new(start, end)
    }

    fn set_selection(&mut self, range: SelectionRange) {
        self.send(SCI_SETSEL, range.start, range.end as isize);
    }

    fn define_highlight(&mut self, style: usize, color: u32) {
        self.send(SCI_INDICSETSTYLE, style, INDIC_STRAIGHTBOX);
        self.send(SCI_INDICSETFORE, style, colorref(color));
        self.send(SCI_INDICSETALPHA, style, HIGHLIGHT_ALPHA);
    }

    fn apply_highlight(&mut self, style: usize, start: usize, len: usize) {
        self.send(SCI_SETINDICATORCURRENT, style, 0);
        self.send(SCI_INDICATORFILLRANGE, start, len as isize);
    }

    fn clear_highlight(&mut self, style: usize, start: usize, len: usize) {
        self.send(SCI_SETINDICATORCURRENT, style, 0);
        self.send(SCI_INDICATORCLEARRANGE, start, len as isize);
    }

    fn highlight_value_at(&self, style: usize, pos: usize) -> bool {
        self.send(SCI_INDICATORVALUEAT, style, pos as isize) != 0
    }

    fn highlight_end(&self, style: usize, pos: usize) -> usize {
        let end = self.send_usize(SCI_INDICATOREND, style, pos as isize);
        // Scintilla answers 0 at the end of the document.
        if end <= pos {
            self.length()
        } else {
            end
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorref_swaps_red_and_blue() {
        assert_eq!(colorref(0x12_34_56), 0x56_34_12);
        assert_eq!(colorref(0xFF_00_00), 0x00_00_FF);
    }

    #[test]
    fn flags_map_to_scfind_bits() {
        let all = SearchFlags { whole_word: true, match_case: true, regex: true };
        assert_eq!(
            search_flags(all),
            SCFIND_WHOLEWORD | SCFIND_MATCHCASE | SCFIND_REGEXP | SCFIND_POSIX
        );
        assert_eq!(search_flags(SearchFlags::default()), 0);
    }
}
