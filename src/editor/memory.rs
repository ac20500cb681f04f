// ── In-memory text buffer ─────────────────────────────────────────────────────
//
// A `TextBuffer` backed by a plain byte vector.  Used by the command-line
// front end and by tests; it mimics the Scintilla behaviours the engine relies
// on: `\r\n` / `\r` / `\n` all terminate lines, backward targets have
// `start > end`, regex searches expose capture groups afterwards, and every
// edit produces `SCN_MODIFIED`-style notifications.

use std::collections::BTreeMap;

use regex::bytes::{Regex, RegexBuilder};
use tracing::trace;

use super::{
    EolMode, Modification, ModificationKind, SearchFlags, SelectionRange, Target, TextBuffer,
};
use crate::error::{Error, Result};

/// Plain-memory document.
pub struct MemoryBuffer {
    text: Vec<u8>,
    line_starts: Vec<usize>,
    eol: EolMode,
    read_only: bool,
    selections: Vec<SelectionRange>,
    /// Group 0 is the whole match; `None` for groups that did not participate.
    last_captures: Vec<Option<Vec<u8>>>,
    compiled: Option<(Vec<u8>, SearchFlags, Regex)>,
    indicators: BTreeMap<usize, Vec<bool>>,
    indicator_colors: BTreeMap<usize, u32>,
    pending: Vec<Modification>,
    undo_depth: usize,
    undo_groups: usize,
}

impl MemoryBuffer {
    /// Create a buffer; the EOL mode is detected from the content.
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        let text = text.into();
        let eol = EolMode::detect(&text);
        let line_starts = compute_line_starts(&text);
        Self {
            text,
            line_starts,
            eol,
            read_only: false,
            selections: vec![SelectionRange::caret(0)],
            last_captures: Vec::new(),
            compiled: None,
            indicators: BTreeMap::new(),
            indicator_colors: BTreeMap::new(),
            pending: Vec::new(),
            undo_depth: 0,
            undo_groups: 0,
        }
    }

    pub fn with_eol_mode(mut self, eol: EolMode) -> Self {
        self.eol = eol;
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn into_text(self) -> Vec<u8> {
        self.text
    }

    /// Install several selections at once (multi-cursor).
    pub fn set_selections(&mut self, ranges: Vec<SelectionRange>) {
        let len = self.text.len();
        self.selections = ranges
            .into_iter()
            .map(|r| SelectionRange::new(r.start.min(len), r.end.min(len)))
            .collect();
        if self.selections.is_empty() {
            self.selections.push(SelectionRange::caret(0));
        }
    }

    /// Color last configured for an indicator style.
    pub fn highlight_color(&self, style: usize) -> Option<u32> {
        self.indicator_colors.get(&style).copied()
    }

    /// Number of completed top-level undo groups.
    pub fn undo_groups(&self) -> usize {
        self.undo_groups
    }

    /// Insert `text` at `pos` as if typed by the user.
    pub fn insert(&mut self, pos: usize, text: &[u8]) {
        self.replace_range(pos, pos, text);
    }

    /// Delete `[start, end)` as if by the user.
    pub fn delete(&mut self, start: usize, end: usize) {
        self.replace_range(start, end, b"");
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn regex_for(&mut self, pattern: &[u8], flags: SearchFlags) -> Result<Regex> {
        if let Some((p, f, re)) = &self.compiled {
            if p == pattern && *f == flags {
                return Ok(re.clone());
            }
        }
        let source = if flags.regex {
            String::from_utf8_lossy(pattern).into_owned()
        } else {
            literal_source(pattern)
        };
        let re = RegexBuilder::new(&source)
            .case_insensitive(!flags.match_case)
            .multi_line(true)
            .crlf(true)
            .build()
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        self.compiled = Some((pattern.to_vec(), flags, re.clone()));
        Ok(re)
    }

    fn expand_template(&self, template: &[u8]) -> Vec<u8> {
        let group = |n: usize| -> &[u8] {
            self.last_captures
                .get(n)
                .and_then(|c| c.as_deref())
                .unwrap_or(b"")
        };
        let mut out = Vec::with_capacity(template.len());
        let mut i = 0;
        while i < template.len() {
            let c = template[i];
            let next = template.get(i + 1).copied();
            match (c, next) {
                (b'\\' | b'$', Some(d)) if d.is_ascii_digit() => {
                    out.extend_from_slice(group(usize::from(d - b'0')));
                    i += 2;
                }
                (b'\\', Some(b'\\')) => {
                    out.push(b'\\');
                    i += 2;
                }
                (b'\\', Some(b'n')) => {
                    out.push(b'\n');
                    i += 2;
                }
                (b'\\', Some(b'r')) => {
                    out.push(b'\r');
                    i += 2;
                }
                (b'\\', Some(b't')) => {
                    out.push(b'\t');
                    i += 2;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        out
    }

    fn shift_position(pos: usize, start: usize, end: usize, inserted: usize) -> usize {
        if pos >= end {
            pos - (end - start) + inserted
        } else if pos > start {
            start
        } else {
            pos
        }
    }

    fn notify(&mut self, kind: ModificationKind, position: usize, length: usize, before: usize) {
        let lines_added = self.line_starts.len() as isize - before as isize;
        let line = self.line_from_position(position);
        trace!(?kind, position, length, lines_added, line, "buffer modified");
        self.pending.push(Modification { kind, position, length, lines_added, line });
    }
}

impl TextBuffer for MemoryBuffer {
    fn length(&self) -> usize {
        self.text.len()
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_from_position(&self, pos: usize) -> usize {
        let pos = pos.min(self.text.len());
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        }
    }

    fn position_from_line(&self, line: usize) -> usize {
        self.line_starts.get(line).copied().unwrap_or(self.text.len())
    }

    fn line_end_position(&self, line: usize) -> usize {
        match self.line_starts.get(line + 1) {
            Some(&next) if next >= 2 && &self.text[next - 2..next] == b"\r\n" => next - 2,
            Some(&next) => next - 1,
            None => self.text.len(),
        }
    }

    fn eol_mode(&self) -> EolMode {
        self.eol
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn text_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.text.len());
        let start = start.min(end);
        self.text[start..end].to_vec()
    }

    fn search_in_range(
        &mut self,
        pattern: &[u8],
        flags: SearchFlags,
        target: Target,
    ) -> Result<Option<(usize, usize)>> {
        if pattern.is_empty() {
            return Ok(None);
        }
        let re = self.regex_for(pattern, flags)?;
        let span = target.span();
        let hi = span.end.min(self.text.len());
        let lo = span.start.min(hi);

        // The haystack ends at the target end so no match can cross it; the
        // bytes before `lo` stay visible for anchors.
        let text = &self.text;
        let hay = &text[..hi];
        let mut found = None;

        if target.is_backward() {
            for at in (lo..=hi).rev() {
                let Some(caps) = re.captures_at(hay, at) else { continue };
                let Some(m) = caps.get(0) else { continue };
                if m.start() == at && self_accepts(text, m.start(), m.end(), flags) {
                    found = Some((m.start(), m.len(), capture_list(&caps)));
                    break;
                }
            }
        } else {
            let mut at = lo;
            while at <= hi {
                let Some(caps) = re.captures_at(hay, at) else { break };
                let Some(m) = caps.get(0) else { break };
                if self_accepts(text, m.start(), m.end(), flags) {
                    found = Some((m.start(), m.len(), capture_list(&caps)));
                    break;
                }
                at = m.start() + 1;
            }
        }

        Ok(found.map(|(pos, len, caps)| {
            self.last_captures = caps;
            (pos, len)
        }))
    }

    fn capture(&self, group: usize) -> Option<Vec<u8>> {
        if group == 0 || group >= self.last_captures.len() {
            return None;
        }
        Some(self.last_captures[group].clone().unwrap_or_default())
    }

    fn replace_range(&mut self, start: usize, end: usize, text: &[u8]) -> usize {
        let end = end.min(self.text.len());
        let start = start.min(end);

        if start < end {
            let before = self.line_starts.len();
            self.text.drain(start..end);
            self.line_starts = compute_line_starts(&self.text);
            for marks in self.indicators.values_mut() {
                if marks.len() > start {
                    let stop = end.min(marks.len());
                    marks.drain(start..stop);
                }
            }
            self.notify(ModificationKind::Delete, start, end - start, before);
        }

        if !text.is_empty() {
            let before = self.line_starts.len();
            self.text.splice(start..start, text.iter().copied());
            self.line_starts = compute_line_starts(&self.text);
            for marks in self.indicators.values_mut() {
                if marks.len() >= start {
                    marks.splice(start..start, std::iter::repeat(false).take(text.len()));
                }
            }
            self.notify(ModificationKind::Insert, start, text.len(), before);
        }

        for sel in &mut self.selections {
            let a = Self::shift_position(sel.start, start, end, text.len());
            let b = Self::shift_position(sel.end, start, end, text.len());
            *sel = SelectionRange::new(a, b);
        }

        start + text.len()
    }

    fn replace_range_regex(&mut self, start: usize, end: usize, template: &[u8]) -> usize {
        let expanded = self.expand_template(template);
        self.replace_range(start, end, &expanded)
    }

    fn begin_undo_action(&mut self) {
        self.undo_depth += 1;
    }

    fn end_undo_action(&mut self) {
        if self.undo_depth > 0 {
            self.undo_depth -= 1;
            if self.undo_depth == 0 {
                self.undo_groups += 1;
            }
        }
    }

    fn take_modifications(&mut self) -> Vec<Modification> {
        std::mem::take(&mut self.pending)
    }

    fn selections(&self) -> Vec<SelectionRange> {
        self.selections.clone()
    }

    fn set_selection(&mut self, range: SelectionRange) {
        let len = self.text.len();
        self.selections = vec![SelectionRange::new(range.start.min(len), range.end.min(len))];
    }

    fn define_highlight(&mut self, style: usize, color: u32) {
        self.indicator_colors.insert(style, color);
    }

    fn apply_highlight(&mut self, style: usize, start: usize, len: usize) {
        let doc_len = self.text.len();
        let marks = self.indicators.entry(style).or_default();
        marks.resize(doc_len, false);
        let end = (start + len).min(doc_len);
        for m in &mut marks[start.min(end)..end] {
            *m = true;
        }
    }

    fn clear_highlight(&mut self, style: usize, start: usize, len: usize) {
        if let Some(marks) = self.indicators.get_mut(&style) {
            let end = (start + len).min(marks.len());
            for m in &mut marks[start.min(end)..end] {
                *m = false;
            }
        }
    }

    fn highlight_value_at(&self, style: usize, pos: usize) -> bool {
        self.indicators
            .get(&style)
            .and_then(|marks| marks.get(pos).copied())
            .unwrap_or(false)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn compute_line_starts(text: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    let mut i = 0;
    while i < text.len() {
        match text[i] {
            b'\r' if text.get(i + 1) == Some(&b'\n') => {
                i += 2;
                starts.push(i);
            }
            b'\r' | b'\n' => {
                i += 1;
                starts.push(i);
            }
            _ => i += 1,
        }
    }
    starts
}

/// Word characters for whole-word matching, as Scintilla defines them by
/// default: ASCII alphanumerics, `_`, and every byte of a multi-byte sequence.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn self_accepts(text: &[u8], start: usize, end: usize, flags: SearchFlags) -> bool {
    if !flags.whole_word || flags.regex {
        return true;
    }
    let before = start == 0 || !is_word_byte(text[start - 1]);
    let after = end >= text.len() || !is_word_byte(text[end]);
    before && after
}

fn capture_list(caps: &regex::bytes::Captures<'_>) -> Vec<Option<Vec<u8>>> {
    caps.iter().map(|m| m.map(|m| m.as_bytes().to_vec())).collect()
}

/// Regex source matching `pattern` literally, byte for byte.
fn literal_source(pattern: &[u8]) -> String {
    match std::str::from_utf8(pattern) {
        Ok(s) => regex::escape(s),
        Err(_) => {
            let mut out = String::with_capacity(pattern.len() * 4);
            for &b in pattern {
                if b.is_ascii() {
                    out.push_str(&regex::escape(&char::from(b).to_string()));
                } else {
                    out.push_str(&format!("(?-u:\\x{b:02X})"));
                }
            }
            out
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(match_case: bool, whole_word: bool) -> SearchFlags {
        SearchFlags { match_case, whole_word, regex: false }
    }

    #[test]
    fn line_geometry_handles_all_terminators() {
        let buf = MemoryBuffer::new("ab\r\ncd\nef\rgh");
        assert_eq!(buf.line_count(), 4);
        assert_eq!(buf.position_from_line(1), 4);
        assert_eq!(buf.line_end_position(0), 2);
        assert_eq!(buf.line_end_position(1), 6);
        assert_eq!(buf.line_end_position(2), 9);
        assert_eq!(buf.line_end_position(3), 12);
        assert_eq!(buf.line_from_position(3), 0);
        assert_eq!(buf.line_from_position(12), 3);
        assert_eq!(buf.line_text(2), b"ef");
    }

    #[test]
    fn empty_document_has_one_line() {
        let buf = MemoryBuffer::new("");
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_end_position(0), 0);
    }

    #[test]
    fn forward_search_respects_target_end() {
        let mut buf = MemoryBuffer::new("cat cat cat");
        let hit = buf.search_in_range(b"cat", literal(true, false), Target::forward(1, 11));
        assert_eq!(hit.unwrap(), Some((4, 3)));
        let miss = buf.search_in_range(b"cat", literal(true, false), Target::forward(5, 10));
        assert_eq!(miss.unwrap(), None);
    }

    #[test]
    fn backward_search_finds_closest_to_start() {
        let mut buf = MemoryBuffer::new("cat cat cat");
        let hit = buf.search_in_range(b"cat", literal(true, false), Target::backward(9, 0));
        assert_eq!(hit.unwrap(), Some((4, 3)));
        let hit = buf.search_in_range(b"aa", literal(true, false), Target::backward(3, 0));
        assert_eq!(hit.unwrap(), None);
    }

    #[test]
    fn whole_word_and_case() {
        let mut buf = MemoryBuffer::new("catalog CAT cat");
        let hit = buf.search_in_range(b"cat", literal(true, true), Target::forward(0, 15));
        assert_eq!(hit.unwrap(), Some((12, 3)));
        let hit = buf.search_in_range(b"cat", literal(false, true), Target::forward(0, 15));
        assert_eq!(hit.unwrap(), Some((8, 3)));
    }

    #[test]
    fn regex_captures_and_back_references() {
        let mut buf = MemoryBuffer::new("key=value");
        let flags = SearchFlags { regex: true, match_case: true, whole_word: false };
        let hit = buf.search_in_range(b"(\\w+)=(\\w+)", flags, Target::forward(0, 9));
        assert_eq!(hit.unwrap(), Some((0, 9)));
        assert_eq!(buf.capture(1), Some(b"key".to_vec()));
        assert_eq!(buf.capture(2), Some(b"value".to_vec()));
        assert_eq!(buf.capture(3), None);
        let end = buf.replace_range_regex(0, 9, b"$2=\\1");
        assert_eq!(buf.text(), b"value=key");
        assert_eq!(end, 9);
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let mut buf = MemoryBuffer::new("x");
        let flags = SearchFlags { regex: true, ..SearchFlags::default() };
        assert!(buf.search_in_range(b"(", flags, Target::forward(0, 1)).is_err());
    }

    #[test]
    fn replace_emits_delete_then_insert() {
        let mut buf = MemoryBuffer::new("a\nb\nc");
        let end = buf.replace_range(1, 4, b"X\nY\nZ\n");
        assert_eq!(buf.text(), b"aX\nY\nZ\nc");
        assert_eq!(end, 7);
        let mods = buf.take_modifications();
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].kind, ModificationKind::Delete);
        assert_eq!(mods[0].lines_added, -2);
        assert_eq!(mods[1].kind, ModificationKind::Insert);
        assert_eq!(mods[1].lines_added, 3);
        assert_eq!(mods[1].line, 0);
        assert!(buf.take_modifications().is_empty());
    }

    #[test]
    fn highlights_follow_edits() {
        let mut buf = MemoryBuffer::new("abcdef");
        buf.apply_highlight(3, 2, 2);
        assert!(buf.highlight_value_at(3, 2));
        assert_eq!(buf.highlight_end(3, 0), 2);
        assert_eq!(buf.highlight_end(3, 2), 4);
        buf.insert(0, b"xx");
        assert!(buf.highlight_value_at(3, 4));
        assert!(!buf.highlight_value_at(3, 2));
        buf.clear_highlight(3, 0, buf.length());
        assert!(!buf.highlight_value_at(3, 4));
    }

    #[test]
    fn selections_shift_with_edits() {
        let mut buf = MemoryBuffer::new("hello world");
        buf.set_selection(SelectionRange::new(6, 11));
        buf.insert(0, b">> ");
        assert_eq!(buf.main_selection(), SelectionRange::new(9, 14));
    }
}
