// ── Scintilla message constants ───────────────────────────────────────────────
//
// Source of truth: Scintilla.h (https://www.scintilla.org/ScintillaDoc.html)
// Only the subset the buffer adapter sends is listed here.
// All SCI_* values are sent via SendMessageW(hwnd_sci, SCI_*, wparam, lparam).

// ── Document geometry ─────────────────────────────────────────────────────────

/// Return byte count of the document (excluding null terminator).
pub(super) const SCI_GETLENGTH: u32 = 2006;
/// Return the number of lines (always >= 1).
pub(super) const SCI_GETLINECOUNT: u32 = 2154;
/// Return the 0-based line containing the byte position in WPARAM.
pub(super) const SCI_LINEFROMPOSITION: u32 = 2166;
/// Return the byte position of the start of the line in WPARAM.
pub(super) const SCI_POSITIONFROMLINE: u32 = 2167;
/// Return the position before the line terminator of the line in WPARAM.
pub(super) const SCI_GETLINEENDPOSITION: u32 = 2136;
/// Return non-zero when the document is read-only.
pub(super) const SCI_GETREADONLY: u32 = 2140;

// ── Line endings ──────────────────────────────────────────────────────────────

/// Return the EOL mode (SC_EOL_*).
pub(super) const SCI_GETEOLMODE: u32 = 2030;
/// `\r\n`
pub(super) const SC_EOL_CRLF: isize = 0;
/// `\r`
pub(super) const SC_EOL_CR: isize = 1;
/// `\n`
pub(super) const SC_EOL_LF: isize = 2;

// ── Content ───────────────────────────────────────────────────────────────────

/// Copy a byte range.  LPARAM = `*mut Sci_TextRangeFull`; the buffer must
/// hold `cpMax - cpMin + 1` bytes.  Returns the copied length.
pub(super) const SCI_GETTEXTRANGEFULL: u32 = 2039;

// ── Target / search ───────────────────────────────────────────────────────────

/// Set both ends of the target.  WPARAM = start, LPARAM = end.
pub(super) const SCI_SETTARGETRANGE: u32 = 2686;
/// Start of the target after a successful search.
pub(super) const SCI_GETTARGETSTART: u32 = 2191;
/// End of the target after a successful search or replace.
pub(super) const SCI_GETTARGETEND: u32 = 2193;
/// Search flags used by `SCI_SEARCHINTARGET`.  WPARAM = SCFIND_* bitmask.
pub(super) const SCI_SETSEARCHFLAGS: u32 = 2198;
/// Search for LPARAM (length WPARAM) within the target.  Returns the match
/// start, `-1` when not found, `-2` for an invalid regular expression.
pub(super) const SCI_SEARCHINTARGET: u32 = 2197;
/// Copy regex group WPARAM of the last search into LPARAM.  Returns the length.
pub(super) const SCI_GETTAG: u32 = 2616;

/// Match whole words only.
pub(super) const SCFIND_WHOLEWORD: usize = 0x2;
/// Case-sensitive match.
pub(super) const SCFIND_MATCHCASE: usize = 0x4;
/// Interpret the pattern as a regular expression.
pub(super) const SCFIND_REGEXP: usize = 0x0020_0000;
/// POSIX-style groups: `(` and `)` without backslashes.
pub(super) const SCFIND_POSIX: usize = 0x0040_0000;

// ── Replace ───────────────────────────────────────────────────────────────────

/// Replace the target with LPARAM (length WPARAM).  Returns the new length.
pub(super) const SCI_REPLACETARGET: u32 = 2194;
/// Like `SCI_REPLACETARGET`, expanding `\1`..`\9` from the last regex search.
pub(super) const SCI_REPLACETARGETRE: u32 = 2195;

// ── Undo ──────────────────────────────────────────────────────────────────────

/// Begin grouping subsequent edits into a single undo step.
pub(super) const SCI_BEGINUNDOACTION: u32 = 2078;
/// End the current undo group.
pub(super) const SCI_ENDUNDOACTION: u32 = 2079;

// ── Selection ─────────────────────────────────────────────────────────────────

/// Number of selections (multi-selection aware).
pub(super) const SCI_GETSELECTIONS: u32 = 2570;
/// Index of the main selection.
pub(super) const SCI_GETMAINSELECTION: u32 = 2575;
/// Start of selection WPARAM.
pub(super) const SCI_GETSELECTIONNSTART: u32 = 2585;
/// End of selection WPARAM.
pub(super) const SCI_GETSELECTIONNEND: u32 = 2587;
/// Select WPARAM (anchor) .. LPARAM (caret) and scroll it into view.
pub(super) const SCI_SETSEL: u32 = 2160;

// ── Indicators ────────────────────────────────────────────────────────────────

/// Set the drawing style of indicator WPARAM.  LPARAM = INDIC_*.
pub(super) const SCI_INDICSETSTYLE: u32 = 2080;
/// Set the colour of indicator WPARAM.  LPARAM = 0xBBGGRR.
pub(super) const SCI_INDICSETFORE: u32 = 2082;
/// Set the fill alpha of indicator WPARAM (0..=255).
pub(super) const SCI_INDICSETALPHA: u32 = 2523;
/// Select the indicator used by the fill/clear calls below.
pub(super) const SCI_SETINDICATORCURRENT: u32 = 2500;
/// Fill WPARAM (start) .. +LPARAM (length) with the current indicator.
pub(super) const SCI_INDICATORFILLRANGE: u32 = 2504;
/// Clear WPARAM (start) .. +LPARAM (length) of the current indicator.
pub(super) const SCI_INDICATORCLEARRANGE: u32 = 2505;
/// Value of indicator WPARAM at position LPARAM.
pub(super) const SCI_INDICATORVALUEAT: u32 = 2507;
/// End of the run of indicator WPARAM containing position LPARAM.
pub(super) const SCI_INDICATOREND: u32 = 2509;

/// A filled box with a solid outline.
pub(super) const INDIC_STRAIGHTBOX: isize = 8;
/// Fill alpha used for all highlight styles.
pub(super) const HIGHLIGHT_ALPHA: isize = 100;

// ── Notifications ─────────────────────────────────────────────────────────────

/// `SCNotification::modificationType` bit: text was inserted.
pub(super) const SC_MOD_INSERTTEXT: i32 = 0x1;
/// `SCNotification::modificationType` bit: text was deleted.
pub(super) const SC_MOD_DELETETEXT: i32 = 0x2;
