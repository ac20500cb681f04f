// ── Mark / highlight tracker ──────────────────────────────────────────────────
//
// Paints every match of a pattern with a highlight style (a Scintilla
// indicator) and reads marked text back out.
//
// Colour conventions:
//   • Colours are 0xRRGGBB.
//   • A single pattern always paints in `MARKER_COLOR` on `MARK_STYLES[0]`.
//   • List entries paint in a colour hashed from their find text, so the same
//     text gets the same colour on every run.  Styles are handed out from
//     `MARK_STYLES[1..]`; once they run out, new colours alias existing
//     styles round-robin and keep that style's earlier colour.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    columns::DelimiterIndex,
    editor::{SearchFlags, TextBuffer},
    error::Result,
    pattern::PatternList,
    search::{scope::Scope, search_forward},
};

/// Indicator ids used for marks.  Ids below 8 belong to lexers and ids the
/// host reserves for its own find marks are skipped.
pub const MARK_STYLES: [usize; 20] =
    [10, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31];

/// Colour of single-pattern marks.
pub const MARKER_COLOR: u32 = 0x00_7F_00;

/// Indicator ids for column highlighting, one per column, reused cyclically.
pub const COLUMN_STYLES: [usize; 10] = [32, 33, 34, 35, 36, 37, 38, 39, 40, 41];

/// Pastel backgrounds for `COLUMN_STYLES`.
pub const COLUMN_COLORS: [u32; 10] = [
    0xFF_E0_E0, 0xC0_E0_FF, 0xE0_FF_E0, 0xFF_F0_C0, 0xE0_C0_FF, //
    0xC0_FF_FF, 0xFF_C0_E0, 0xF0_F0_F0, 0xFF_D0_A0, 0xD0_FF_A0,
];

/// DJB2 hash of `text`, reduced to a 24-bit colour.
pub fn generate_color(text: &[u8]) -> u32 {
    let hash = text
        .iter()
        .fold(5381u32, |h, &b| h.wrapping_mul(33).wrapping_add(u32::from(b)));
    hash & 0x00FF_FFFF
}

/// Text collected from every marked run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkedText {
    pub text: Vec<u8>,
    /// Number of separate marked runs.
    pub blocks: usize,
}

// ── MarkTracker ───────────────────────────────────────────────────────────────

/// Owns the colour→style assignment for one document.
#[derive(Debug, Default)]
pub struct MarkTracker {
    styles: HashMap<u32, usize>,
    marked_strings: usize,
}

impl MarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// List entries that marked at least once during the last `mark_list`.
    pub fn marked_strings(&self) -> usize {
        self.marked_strings
    }

    /// Styles currently in use.
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    /// Style assigned to `color`, if any.
    pub fn style_for(&self, color: u32) -> Option<usize> {
        self.styles.get(&color).copied()
    }

    /// Mark every match of one pattern in the fixed single-pattern style.
    pub fn mark_all<B: TextBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        pattern: &[u8],
        flags: SearchFlags,
        scope: Scope<'_>,
    ) -> Result<usize> {
        self.mark_pattern(buffer, pattern, flags, scope, MARKER_COLOR, false)
    }

    /// Mark every enabled list entry, each in its own hashed colour.
    /// Returns the total number of matches marked.
    pub fn mark_list<B: TextBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        list: &PatternList,
        scope: Scope<'_>,
    ) -> Result<usize> {
        self.marked_strings = 0;
        let mut total = 0;
        for entry in list.enabled() {
            let pattern = entry.find_bytes();
            let color = generate_color(&pattern);
            let count = self.mark_pattern(buffer, &pattern, entry.search_flags(), scope, color, true)?;
            if count > 0 {
                self.marked_strings += 1;
            }
            total += count;
        }
        debug!(total, strings = self.marked_strings, styles = self.styles.len(), "list marked");
        Ok(total)
    }

    fn mark_pattern<B: TextBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        pattern: &[u8],
        flags: SearchFlags,
        scope: Scope<'_>,
        color: u32,
        from_list: bool,
    ) -> Result<usize> {
        if pattern.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        let mut pos = 0;
        while pos <= buffer.length() {
            let Some(hit) = search_forward(buffer, pattern, flags, scope, pos)? else {
                break;
            };
            if hit.length > 0 {
                let style = self.style(buffer, color, from_list);
                buffer.apply_highlight(style, hit.position, hit.length);
            }
            count += 1;
            pos = hit.end().max(hit.position + 1);
        }
        Ok(count)
    }

    /// Style for `color`, assigning and configuring one on first use.
    fn style<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, color: u32, from_list: bool) -> usize {
        if let Some(&style) = self.styles.get(&color) {
            return style;
        }
        let style = if from_list {
            MARK_STYLES[self.styles.len() % (MARK_STYLES.len() - 1) + 1]
        } else {
            MARK_STYLES[0]
        };
        // An aliased style keeps the colour it was first defined with.
        let aliased = self.styles.values().any(|&s| s == style);
        self.styles.insert(color, style);
        if !aliased {
            buffer.define_highlight(style, color);
        }
        style
    }

    /// Remove every mark from the document and forget the style map.
    pub fn clear_all<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        let len = buffer.length();
        for &style in &MARK_STYLES {
            buffer.clear_highlight(style, 0, len);
        }
        self.styles.clear();
        self.marked_strings = 0;
    }

    /// Concatenate all marked text, style by style in document order.
    pub fn extract_marked_text<B: TextBuffer + ?Sized>(&self, buffer: &B) -> MarkedText {
        let mut out = MarkedText::default();
        for &style in &MARK_STYLES {
            collect_runs(buffer, style, &mut out);
        }
        out
    }
}

fn collect_runs<B: TextBuffer + ?Sized>(buffer: &B, style: usize, out: &mut MarkedText) {
    let len = buffer.length();
    let mut pos = 0;
    while pos < len {
        let end = buffer.highlight_end(style, pos);
        if end <= pos {
            break;
        }
        if buffer.highlight_value_at(style, pos) {
            out.blocks += 1;
            out.text.extend(buffer.text_range(pos, end));
        }
        pos = end;
    }
}

// ── Column highlighting ───────────────────────────────────────────────────────

/// Paint each selected column with its column colour.  Lines without a
/// delimiter count as one wide first column.
pub fn highlight_columns<B: TextBuffer + ?Sized>(buffer: &mut B, index: &DelimiterIndex) {
    for (&style, &color) in COLUMN_STYLES.iter().zip(&COLUMN_COLORS) {
        buffer.define_highlight(style, color);
    }
    for line in 0..index.len() {
        for (column, start, end) in index.selected_columns(line) {
            if end > start {
                let style = COLUMN_STYLES[(column - 1) % COLUMN_STYLES.len()];
                buffer.apply_highlight(style, start, end - start);
            }
        }
    }
    debug!(lines = index.len(), "columns highlighted");
}

pub fn clear_column_highlights<B: TextBuffer + ?Sized>(buffer: &mut B) {
    let len = buffer.length();
    for &style in &COLUMN_STYLES {
        buffer.clear_highlight(style, 0, len);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{columns::ColumnDelimiterData, editor::memory::MemoryBuffer, pattern::PatternEntry};
    use pretty_assertions::assert_eq;

    fn literal() -> SearchFlags {
        SearchFlags::default()
    }

    #[test]
    fn color_is_deterministic() {
        assert_eq!(generate_color(b"foo"), generate_color(b"foo"));
        assert_ne!(generate_color(b"foo"), generate_color(b"bar"));
        // 5381 * 33 + 'a'
        assert_eq!(generate_color(b"a"), (5381 * 33 + 97) & 0xFF_FFFF);
        assert!(generate_color(b"a long pattern text") <= 0xFF_FFFF);
    }

    #[test]
    fn single_pattern_uses_fixed_style() {
        let mut buf = MemoryBuffer::new("one two one");
        let mut marks = MarkTracker::new();
        let n = marks.mark_all(&mut buf, b"one", literal(), Scope::Document).unwrap();
        assert_eq!(n, 2);
        assert_eq!(marks.style_for(MARKER_COLOR), Some(MARK_STYLES[0]));
        assert_eq!(buf.highlight_color(MARK_STYLES[0]), Some(MARKER_COLOR));
        assert!(buf.highlight_value_at(MARK_STYLES[0], 8));
        assert!(!buf.highlight_value_at(MARK_STYLES[0], 4));
    }

    #[test]
    fn list_entries_get_their_own_styles() {
        let mut buf = MemoryBuffer::new("red green blue");
        let list: PatternList = [
            PatternEntry::new("red", ""),
            PatternEntry::new("blue", ""),
            PatternEntry::new("violet", ""),
        ]
        .into_iter()
        .collect();
        let mut marks = MarkTracker::new();
        assert_eq!(marks.mark_list(&mut buf, &list, Scope::Document).unwrap(), 2);
        assert_eq!(marks.marked_strings(), 2);

        let red = marks.style_for(generate_color(b"red")).unwrap();
        let blue = marks.style_for(generate_color(b"blue")).unwrap();
        assert_ne!(red, blue);
        assert_ne!(red, MARK_STYLES[0]);
        assert_eq!(buf.highlight_color(blue), Some(generate_color(b"blue")));
    }

    #[test]
    fn styles_alias_past_the_limit() {
        let words: Vec<String> = (0..MARK_STYLES.len() + 3).map(|i| format!("w{i:02}")).collect();
        let mut buf = MemoryBuffer::new(words.join(" "));
        let list: PatternList = words.iter().map(|w| PatternEntry::new(w.as_str(), "")).collect();
        let mut marks = MarkTracker::new();
        let n = marks.mark_list(&mut buf, &list, Scope::Document).unwrap();
        assert_eq!(n, words.len());
        for w in &words {
            let style = marks.style_for(generate_color(w.as_bytes())).unwrap();
            assert!(MARK_STYLES[1..].contains(&style));
        }
        // The first pattern on each style owns its colour.
        let owners = MARK_STYLES.len() - 1;
        for w in &words[..owners] {
            let color = generate_color(w.as_bytes());
            let style = marks.style_for(color).unwrap();
            assert_eq!(buf.highlight_color(style), Some(color), "{w}");
        }
        let reused = marks.style_for(generate_color(words[owners].as_bytes())).unwrap();
        assert_eq!(reused, marks.style_for(generate_color(words[0].as_bytes())).unwrap());
        assert_eq!(buf.highlight_color(reused), Some(generate_color(words[0].as_bytes())));
    }

    #[test]
    fn clear_removes_everything() {
        let mut buf = MemoryBuffer::new("aaa");
        let mut marks = MarkTracker::new();
        marks.mark_all(&mut buf, b"a", literal(), Scope::Document).unwrap();
        marks.clear_all(&mut buf);
        assert_eq!(marks.style_count(), 0);
        assert!((0..3).all(|p| !buf.highlight_value_at(MARK_STYLES[0], p)));
        assert_eq!(marks.extract_marked_text(&buf), MarkedText::default());
    }

    #[test]
    fn extract_counts_blocks() {
        let mut buf = MemoryBuffer::new("ab ab xab");
        let mut marks = MarkTracker::new();
        marks.mark_all(&mut buf, b"ab", literal(), Scope::Document).unwrap();
        let out = marks.extract_marked_text(&buf);
        assert_eq!(out.blocks, 3);
        assert_eq!(out.text, b"ababab");
    }

    #[test]
    fn adjacent_matches_form_one_block() {
        let mut buf = MemoryBuffer::new("xxxx y");
        let mut marks = MarkTracker::new();
        assert_eq!(marks.mark_all(&mut buf, b"xx", literal(), Scope::Document).unwrap(), 2);
        assert_eq!(marks.extract_marked_text(&buf).blocks, 1);
    }

    #[test]
    fn empty_regex_matches_terminate() {
        let mut buf = MemoryBuffer::new("abc");
        let flags = SearchFlags { regex: true, ..SearchFlags::default() };
        let mut marks = MarkTracker::new();
        assert_eq!(marks.mark_all(&mut buf, b"z*", flags, Scope::Document).unwrap(), 4);
        assert_eq!(marks.extract_marked_text(&buf).blocks, 0);
    }

    #[test]
    fn column_highlighting() {
        let mut buf = MemoryBuffer::new("a,bb,c\nd,e,f");
        let data = ColumnDelimiterData::parse("2", ",", "").unwrap();
        let index = DelimiterIndex::build(&buf, data);
        highlight_columns(&mut buf, &index);
        let style = COLUMN_STYLES[1];
        assert!(buf.highlight_value_at(style, 2) && buf.highlight_value_at(style, 3));
        assert!(!buf.highlight_value_at(style, 4));
        assert!(buf.highlight_value_at(style, 9));

        clear_column_highlights(&mut buf);
        assert!(!buf.highlight_value_at(style, 2));
    }
}
