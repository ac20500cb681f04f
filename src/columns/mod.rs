// ── Delimiter / column index ──────────────────────────────────────────────────
//
// Per-line table of delimiter offsets for column-restricted searches.
//
// The index is built once with a full scan and then kept current by replaying
// the `ChangeLog`: inserts and deletes splice `LineInfo` rows in and out,
// modified lines are rescanned and the offset drift is pushed down to every
// later row.  Offsets are absolute byte positions.
//
// Invariant after `rebuild` or `reconcile`:
//   lines.len() == buffer.line_count()
//   lines[i].end + eol_len == lines[i + 1].start

use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use crate::{
    editor::{Modification, TextBuffer},
    error::UserInputError,
    escape,
};

pub mod changelog;

pub use changelog::{ChangeLog, ChangeLogEntry};

/// Upper bound on the number of columns one spec may select.
const MAX_SELECTED_COLUMNS: usize = 4096;

// ── ColumnDelimiterData ───────────────────────────────────────────────────────

/// Which columns to search and how they are separated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDelimiterData {
    /// 1-based column numbers.
    pub columns: BTreeSet<usize>,
    /// Escape-decoded delimiter.
    pub delimiter: Vec<u8>,
    pub quote: Option<u8>,
}

impl ColumnDelimiterData {
    /// Parse the three column-mode input fields.
    ///
    /// `columns` is a comma list of `N` or `A-B` items; leading and trailing
    /// commas are ignored.  `delimiter` goes through the extended decoder.
    /// `quote` must be empty, `"` or `'`.
    pub fn parse(columns: &str, delimiter: &str, quote: &str) -> Result<Self, UserInputError> {
        let spec = columns.trim_matches(',');
        if spec.is_empty() || delimiter.is_empty() {
            return Err(UserInputError::MissingColumnData);
        }

        let mut selected = BTreeSet::new();
        for block in spec.split(',') {
            let block = block.trim();
            if let Some((a, b)) = block.split_once('-') {
                let start = parse_column(a)?;
                let end = parse_column(b)?;
                if start < 1 || end < start {
                    return Err(UserInputError::InvalidColumnRange);
                }
                if end - start >= MAX_SELECTED_COLUMNS as i64 {
                    return Err(UserInputError::InvalidColumnRange);
                }
                selected.extend((start..=end).map(|c| c as usize));
            } else {
                let column = parse_column(block)?;
                if column < 1 {
                    return Err(UserInputError::InvalidColumnNumber);
                }
                selected.insert(column as usize);
            }
        }

        let delimiter = escape::decode(delimiter);
        if delimiter.is_empty() {
            return Err(UserInputError::EmptyDelimiter);
        }

        let quote = match quote {
            "" => None,
            "\"" => Some(b'"'),
            "'" => Some(b'\''),
            _ => return Err(UserInputError::InvalidQuoteChar),
        };

        Ok(Self { columns: selected, delimiter, quote })
    }

    pub fn is_valid(&self) -> bool {
        !self.columns.is_empty() && !self.delimiter.is_empty()
    }

    pub fn contains(&self, column: usize) -> bool {
        self.columns.contains(&column)
    }
}

fn parse_column(text: &str) -> Result<i64, UserInputError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| UserInputError::ColumnSyntax)
}

// ── LineInfo ──────────────────────────────────────────────────────────────────

/// Delimiter positions of one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    pub start: usize,
    /// Position before the line terminator.
    pub end: usize,
    /// Ascending, each within `start..=end`.
    pub delimiters: Vec<usize>,
}

impl LineInfo {
    fn empty_at(pos: usize) -> Self {
        Self { start: pos, end: pos, delimiters: Vec::new() }
    }

    fn shift(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
        self.end = self.end.saturating_add_signed(delta);
        for d in &mut self.delimiters {
            *d = d.saturating_add_signed(delta);
        }
    }

    /// Number of columns on this line (delimiters + 1).
    pub fn column_count(&self) -> usize {
        self.delimiters.len() + 1
    }

    /// 1-based column containing `pos`.  A position on a delimiter belongs to
    /// the column the delimiter closes.
    pub fn column_at(&self, pos: usize) -> usize {
        self.delimiters
            .iter()
            .position(|&d| pos <= d)
            .map_or(self.column_count(), |i| i + 1)
    }

    /// `[start, end)` of 1-based `column`, delimiters excluded.
    pub fn column_bounds(&self, column: usize, delimiter_len: usize) -> Option<(usize, usize)> {
        if column == 0 || column > self.column_count() {
            return None;
        }
        let start = if column == 1 {
            self.start
        } else {
            self.delimiters[column - 2] + delimiter_len
        };
        let end = self.delimiters.get(column - 1).copied().unwrap_or(self.end);
        Some((start, end.max(start)))
    }
}

/// Scan one buffer line for delimiters.
///
/// A configured quote byte toggles a quoted state in which delimiters are
/// ignored; quotes are never escaped or doubled.
pub fn scan_line<B: TextBuffer + ?Sized>(
    buffer: &B,
    line: usize,
    data: &ColumnDelimiterData,
) -> LineInfo {
    let start = buffer.position_from_line(line);
    let end = buffer.line_end_position(line);
    let text = buffer.text_range(start, end);
    let delim = data.delimiter.as_slice();

    let mut delimiters = Vec::new();
    let mut in_quotes = false;
    let mut pos = 0;
    while pos < text.len() {
        if data.quote == Some(text[pos]) {
            in_quotes = !in_quotes;
            pos += 1;
            continue;
        }
        if !in_quotes && !delim.is_empty() && text[pos..].starts_with(delim) {
            delimiters.push(start + pos);
            pos += delim.len();
            continue;
        }
        pos += 1;
    }

    LineInfo { start, end, delimiters }
}

// ── ColumnInfo ────────────────────────────────────────────────────────────────

/// Where a position sits in column terms.  `line` is 0-based, `column`
/// 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub total_lines: usize,
    pub line: usize,
    pub column: usize,
}

// ── DelimiterIndex ────────────────────────────────────────────────────────────

/// The per-line delimiter table for one document.
#[derive(Debug, Clone)]
pub struct DelimiterIndex {
    data: ColumnDelimiterData,
    lines: Vec<LineInfo>,
    eol_len: usize,
}

impl DelimiterIndex {
    /// Scan the whole document.
    pub fn build<B: TextBuffer + ?Sized>(buffer: &B, data: ColumnDelimiterData) -> Self {
        let mut index = Self { data, lines: Vec::new(), eol_len: buffer.eol_mode().len() };
        index.rebuild(buffer);
        index
    }

    /// Discard all rows and rescan every line.
    pub fn rebuild<B: TextBuffer + ?Sized>(&mut self, buffer: &B) {
        self.eol_len = buffer.eol_mode().len();
        let count = buffer.line_count();
        self.lines = (0..count).map(|l| scan_line(buffer, l, &self.data)).collect();
        debug!(lines = count, "delimiter index rebuilt");
    }

    pub fn data(&self) -> &ColumnDelimiterData {
        &self.data
    }

    pub fn lines(&self) -> &[LineInfo] {
        &self.lines
    }

    pub fn line(&self, line: usize) -> Option<&LineInfo> {
        self.lines.get(line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn eol_len(&self) -> usize {
        self.eol_len
    }

    pub fn delimiter_len(&self) -> usize {
        self.data.delimiter.len()
    }

    /// Line and 1-based column of `pos`; `None` until the index has rows.
    pub fn column_info<B: TextBuffer + ?Sized>(&self, buffer: &B, pos: usize) -> Option<ColumnInfo> {
        if self.lines.is_empty() || !self.data.is_valid() {
            return None;
        }
        let line = buffer.line_from_position(pos);
        let column = self.lines.get(line).map_or(1, |info| info.column_at(pos));
        Some(ColumnInfo { total_lines: buffer.line_count(), line, column })
    }

    /// `[start, end)` of `column` on `line`.
    pub fn column_bounds(&self, line: usize, column: usize) -> Option<(usize, usize)> {
        self.lines.get(line)?.column_bounds(column, self.delimiter_len())
    }

    /// `(column, start, end)` for every selected column present on `line`,
    /// in column order.
    pub fn selected_columns(&self, line: usize) -> Vec<(usize, usize, usize)> {
        let Some(info) = self.lines.get(line) else {
            return Vec::new();
        };
        self.data
            .columns
            .iter()
            .take_while(|&&c| c <= info.column_count())
            .filter_map(|&c| {
                info.column_bounds(c, self.delimiter_len())
                    .map(|(s, e)| (c, s, e))
            })
            .collect()
    }

    // ── Reconciliation ───────────────────────────────────────────────────────

    /// Apply every queued change, leaving `log` empty.
    ///
    /// Structural entries are replayed in order, shifting the line numbers
    /// of modify references collected so far.  The surviving modified lines
    /// are then rescanned in ascending order, so each rescan sees a correct
    /// start for every earlier line.  If the result still disagrees with the
    /// buffer's geometry the index is rebuilt from scratch.
    pub fn reconcile<B: TextBuffer + ?Sized>(&mut self, log: &mut ChangeLog, buffer: &B) {
        let entries = log.drain();
        if entries.is_empty() {
            return;
        }
        trace!(entries = entries.len(), "reconciling delimiter index");

        // `None` marks a reference to a line that has since been deleted.
        let mut pending: Vec<Option<usize>> = Vec::new();
        for entry in entries {
            match entry {
                ChangeLogEntry::Insert(line) => {
                    let last = pending.len().checked_sub(1);
                    for (i, slot) in pending.iter_mut().enumerate() {
                        let Some(l) = slot.as_mut() else { continue };
                        // The line the insert split from keeps its number.
                        if Some(i) == last && line >= 1 && *l == line - 1 {
                            continue;
                        }
                        if *l + 1 >= line {
                            *l += 1;
                        }
                    }
                    self.insert_line(line);
                    pending.push(Some(line));
                }
                ChangeLogEntry::Delete(line) => {
                    for slot in &mut pending {
                        match *slot {
                            Some(l) if l > line => *slot = Some(l - 1),
                            Some(l) if l == line => *slot = None,
                            _ => {}
                        }
                    }
                    self.delete_line(line);
                }
                ChangeLogEntry::Modify(line) => pending.push(Some(line)),
            }
        }

        let modified: BTreeSet<usize> = pending.into_iter().flatten().collect();
        for line in modified {
            self.modify_line(buffer, line);
        }

        if !self.matches_geometry(buffer) {
            warn!(
                index_lines = self.lines.len(),
                buffer_lines = buffer.line_count(),
                "delimiter index out of step with buffer, rebuilding"
            );
            self.rebuild(buffer);
        }
    }

    fn insert_line(&mut self, line: usize) {
        if line > self.lines.len() {
            trace!(line, "stale insert ignored");
            return;
        }
        let start = match line {
            0 => 0,
            _ => self.lines[line - 1].end + self.eol_len,
        };
        self.lines.insert(line, LineInfo::empty_at(start));
    }

    fn delete_line(&mut self, line: usize) {
        if line >= self.lines.len() {
            trace!(line, "stale delete ignored");
            return;
        }
        let removed = self.lines.remove(line);
        let delta = (removed.end - removed.start + self.eol_len) as isize;
        for info in &mut self.lines[line..] {
            info.shift(-delta);
        }
    }

    fn modify_line<B: TextBuffer + ?Sized>(&mut self, buffer: &B, line: usize) {
        if line >= self.lines.len() {
            trace!(line, "stale modify ignored");
            return;
        }
        self.lines[line] = scan_line(buffer, line, &self.data);
        if let Some(next) = self.lines.get(line + 1) {
            let expected = self.lines[line].end + self.eol_len;
            let drift = next.start as isize - expected as isize;
            if drift != 0 {
                for info in &mut self.lines[line + 1..] {
                    info.shift(-drift);
                }
            }
        }
    }

    fn matches_geometry<B: TextBuffer + ?Sized>(&self, buffer: &B) -> bool {
        let count = buffer.line_count();
        self.lines.len() == count
            && self.lines.last().map(|l| l.end) == Some(buffer.line_end_position(count - 1))
    }

    /// Check the structural invariants, describing the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (i, info) in self.lines.iter().enumerate() {
            if info.start > info.end {
                return Err(format!("line {i}: start {} > end {}", info.start, info.end));
            }
            if info.delimiters.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("line {i}: delimiters not ascending"));
            }
            if info.delimiters.iter().any(|&d| d < info.start || d > info.end) {
                return Err(format!("line {i}: delimiter outside line"));
            }
            if let Some(next) = self.lines.get(i + 1) {
                if info.end + self.eol_len != next.start {
                    return Err(format!(
                        "line {i}: end {} + eol {} != next start {}",
                        info.end, self.eol_len, next.start
                    ));
                }
            }
        }
        Ok(())
    }
}

// ── ColumnScope ───────────────────────────────────────────────────────────────

/// A configured column scope: the index together with the changes it has
/// not seen yet.  Lives as long as the column settings stay unchanged.
#[derive(Debug, Clone)]
pub struct ColumnScope {
    index: DelimiterIndex,
    log: ChangeLog,
}

impl ColumnScope {
    pub fn new<B: TextBuffer + ?Sized>(buffer: &B, data: ColumnDelimiterData) -> Self {
        Self { index: DelimiterIndex::build(buffer, data), log: ChangeLog::new() }
    }

    pub fn index(&self) -> &DelimiterIndex {
        &self.index
    }

    pub fn data(&self) -> &ColumnDelimiterData {
        self.index.data()
    }

    pub fn pending(&self) -> &ChangeLog {
        &self.log
    }

    /// Queue one host notification.
    pub fn record(&mut self, change: &Modification) {
        self.log.record(change);
    }

    /// Bring the index up to date with `buffer`.
    ///
    /// A changed EOL mode invalidates every offset, so that case rescans
    /// the whole document instead of replaying the log.
    pub fn reconcile<B: TextBuffer + ?Sized>(&mut self, buffer: &B) {
        if buffer.eol_mode().len() != self.index.eol_len() {
            debug!("eol mode changed, rescanning columns");
            self.log.clear();
            self.index.rebuild(buffer);
            return;
        }
        self.index.reconcile(&mut self.log, buffer);
    }

    /// Discard pending changes and rescan.
    pub fn rebuild<B: TextBuffer + ?Sized>(&mut self, buffer: &B) {
        self.log.clear();
        self.index.rebuild(buffer);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::memory::MemoryBuffer;
    use pretty_assertions::assert_eq;

    fn csv_data(columns: &str) -> ColumnDelimiterData {
        ColumnDelimiterData::parse(columns, ",", "").unwrap()
    }

    /// Apply the buffer's pending notifications to `index`.
    fn sync(index: &mut DelimiterIndex, buf: &mut MemoryBuffer) {
        let mut log = ChangeLog::new();
        for m in buf.take_modifications() {
            log.record(&m);
        }
        index.reconcile(&mut log, buf);
    }

    fn assert_matches_fresh_scan(index: &DelimiterIndex, buf: &MemoryBuffer) {
        let fresh = DelimiterIndex::build(buf, index.data().clone());
        assert_eq!(index.lines(), fresh.lines());
        index.check_invariants().unwrap();
    }

    #[test]
    fn parse_column_lists_and_ranges() {
        let d = ColumnDelimiterData::parse(",1,3-5,", r"\t", "'").unwrap();
        assert_eq!(d.columns.iter().copied().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
        assert_eq!(d.delimiter, b"\t");
        assert_eq!(d.quote, Some(b'\''));
        assert!(d.is_valid());
    }

    #[test]
    fn parse_rejections() {
        use UserInputError::*;
        assert_eq!(ColumnDelimiterData::parse("", ",", ""), Err(MissingColumnData));
        assert_eq!(ColumnDelimiterData::parse("1", "", ""), Err(MissingColumnData));
        assert_eq!(ColumnDelimiterData::parse("3-1", ",", ""), Err(InvalidColumnRange));
        assert_eq!(ColumnDelimiterData::parse("0-2", ",", ""), Err(InvalidColumnRange));
        assert_eq!(ColumnDelimiterData::parse("0", ",", ""), Err(InvalidColumnNumber));
        assert_eq!(ColumnDelimiterData::parse("a", ",", ""), Err(ColumnSyntax));
        assert_eq!(ColumnDelimiterData::parse("1,,2", ",", ""), Err(ColumnSyntax));
        assert_eq!(ColumnDelimiterData::parse("1", ",", "x"), Err(InvalidQuoteChar));
        assert_eq!(ColumnDelimiterData::parse("1", ",", "\"\""), Err(InvalidQuoteChar));
    }

    #[test]
    fn scan_respects_quotes_and_multibyte_delimiters() {
        let buf = MemoryBuffer::new("a,\"b,c\",d\nx::y::z");
        let data = ColumnDelimiterData::parse("1", ",", "\"").unwrap();
        assert_eq!(scan_line(&buf, 0, &data).delimiters, vec![1, 7]);
        let data = ColumnDelimiterData::parse("1", "::", "").unwrap();
        let info = scan_line(&buf, 1, &data);
        assert_eq!((info.start, info.end), (10, 17));
        assert_eq!(info.delimiters, vec![11, 14]);
    }

    #[test]
    fn column_bounds_cover_field_text() {
        let buf = MemoryBuffer::new("a,b,c");
        let index = DelimiterIndex::build(&buf, csv_data("2"));
        assert_eq!(index.column_bounds(0, 1), Some((0, 1)));
        assert_eq!(index.column_bounds(0, 2), Some((2, 3)));
        assert_eq!(index.column_bounds(0, 3), Some((4, 5)));
        assert_eq!(index.column_bounds(0, 4), None);
        assert_eq!(index.selected_columns(0), vec![(2, 2, 3)]);
    }

    #[test]
    fn column_info_positions() {
        let buf = MemoryBuffer::new("aa,bb,cc\n1,2");
        let index = DelimiterIndex::build(&buf, csv_data("1"));
        let at = |pos| index.column_info(&buf, pos).unwrap();
        assert_eq!(at(0).column, 1);
        assert_eq!(at(2).column, 1);
        assert_eq!(at(3).column, 2);
        assert_eq!(at(7).column, 3);
        assert_eq!(at(11), ColumnInfo { total_lines: 2, line: 1, column: 2 });
    }

    #[test]
    fn typing_inside_a_line_shifts_later_lines() {
        let mut buf = MemoryBuffer::new("a,b\nc,d\ne,f");
        let mut index = DelimiterIndex::build(&buf, csv_data("1"));
        buf.insert(1, b"xyz,");
        sync(&mut index, &mut buf);
        assert_eq!(index.line(0).unwrap().delimiters, vec![4, 5]);
        assert_eq!(index.line(2).unwrap().start, 12);
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn splitting_and_joining_lines() {
        let mut buf = MemoryBuffer::new("a,b,c\nd,e\nf");
        let mut index = DelimiterIndex::build(&buf, csv_data("1"));

        buf.insert(2, b"\n\n");
        sync(&mut index, &mut buf);
        assert_eq!(index.len(), 5);
        assert_matches_fresh_scan(&index, &buf);

        buf.delete(1, 6);
        sync(&mut index, &mut buf);
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn newline_at_document_start() {
        let mut buf = MemoryBuffer::new("abc\nd,e");
        let mut index = DelimiterIndex::build(&buf, csv_data("1"));
        buf.insert(0, b"\n");
        sync(&mut index, &mut buf);
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn crlf_documents() {
        let mut buf = MemoryBuffer::new("a;b\r\nc;d\r\ne");
        let data = ColumnDelimiterData::parse("2", ";", "").unwrap();
        let mut index = DelimiterIndex::build(&buf, data);
        assert_eq!(index.eol_len(), 2);
        buf.insert(5, b"new;line\r\n");
        sync(&mut index, &mut buf);
        assert_eq!(index.len(), 4);
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn several_edits_in_one_batch() {
        let mut buf = MemoryBuffer::new("1,2\n3,4\n5,6\n7,8");
        let mut index = DelimiterIndex::build(&buf, csv_data("1"));
        buf.insert(buf.position_from_line(3), b"x,");
        buf.insert(0, b"y,");
        buf.replace_range(6, 9, b"q\nr,s\nt");
        sync(&mut index, &mut buf);
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn stale_entries_are_ignored() {
        let buf = MemoryBuffer::new("a,b");
        let mut index = DelimiterIndex::build(&buf, csv_data("1"));
        let mut log = ChangeLog::new();
        log.record(&crate::editor::Modification {
            kind: crate::editor::ModificationKind::Insert,
            position: 0,
            length: 0,
            lines_added: 0,
            line: 40,
        });
        index.reconcile(&mut log, &buf);
        assert!(log.is_empty());
        assert_matches_fresh_scan(&index, &buf);
    }

    #[test]
    fn column_scope_catches_up_on_reconcile() {
        let mut buf = MemoryBuffer::new("a,b\nc,d");
        let mut scope = ColumnScope::new(&buf, csv_data("2"));
        buf.insert(0, b"x,y\n");
        for m in buf.take_modifications() {
            scope.record(&m);
        }
        assert!(!scope.pending().is_empty());
        scope.reconcile(&buf);
        assert!(scope.pending().is_empty());
        assert_eq!(scope.index().len(), 3);
        assert_matches_fresh_scan(scope.index(), &buf);
    }

    #[test]
    fn column_scope_rescans_when_eol_mode_changes() {
        let crlf = MemoryBuffer::new("a,b\r\nc,d").with_eol_mode(crate::editor::EolMode::Crlf);
        let mut scope = ColumnScope::new(&crlf, csv_data("2"));
        assert_eq!(scope.index().eol_len(), 2);

        // the host converted line endings; the queued edit refers to old offsets
        let mut lf = MemoryBuffer::new("a,b\nc,d,e").with_eol_mode(crate::editor::EolMode::Lf);
        lf.take_modifications();
        scope.record(&Modification {
            kind: crate::editor::ModificationKind::Insert,
            position: 9,
            length: 2,
            lines_added: 0,
            line: 1,
        });
        scope.reconcile(&lf);

        assert!(scope.pending().is_empty());
        assert_eq!(scope.index().eol_len(), 1);
        assert_matches_fresh_scan(scope.index(), &lf);
    }
}
