// ── Replacement ───────────────────────────────────────────────────────────────
//
// `replace_one` backs the "Replace" button: it only writes when the current
// selection is exactly the next match, so a stale selection is never
// overwritten.  `replace_all` walks the scope from the top, re-deriving the
// scope after every edit.
//
// Scripted entries hand each match to an `ExpressionEvaluator` together with
// these variables:
//
//   CNT   running match number within this run (1-based)
//   LCNT  match number within the current line
//   LINE  1-based line of the match
//   LPOS  1-based byte offset of the match within its line
//   APOS  1-based absolute byte offset
//   COL   1-based column in column scope, 0 otherwise
//   MATCH the matched text
//   CAPn  regex capture groups, while they are non-empty

use tracing::{debug, warn};

use super::{scope::LiveScope, search_forward, SearchResult};
use crate::{
    editor::{SelectionRange, TextBuffer},
    error::{Result, ScriptError},
    pattern::{PatternEntry, PatternList},
    script::{Environment, ExpressionEvaluator},
};

// ── Match variables ───────────────────────────────────────────────────────────

/// Counters and position data for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub cnt: usize,
    pub lcnt: usize,
    pub line: usize,
    pub lpos: usize,
    pub apos: usize,
    pub col: usize,
    pub matched: Vec<u8>,
    pub captures: Vec<Vec<u8>>,
}

impl MatchContext {
    /// Gather the context of `hit`.  Must run before any other search, since
    /// captures come from the buffer's last match.
    pub fn capture<B: TextBuffer + ?Sized>(
        buffer: &B,
        hit: &SearchResult,
        counts: (usize, usize),
        col: usize,
        regex: bool,
    ) -> Self {
        let line = buffer.line_from_position(hit.position);
        let line_start = buffer.position_from_line(line);
        let mut captures = Vec::new();
        if regex {
            for group in 1.. {
                match buffer.capture(group) {
                    Some(text) if !text.is_empty() => captures.push(text),
                    _ => break,
                }
            }
        }
        Self {
            cnt: counts.0,
            lcnt: counts.1,
            line: line + 1,
            lpos: hit.position - line_start + 1,
            apos: hit.position + 1,
            col,
            matched: hit.matched_text.clone(),
            captures,
        }
    }

    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        env.set_int("CNT", self.cnt as i64);
        env.set_int("LCNT", self.lcnt as i64);
        env.set_int("LINE", self.line as i64);
        env.set_int("LPOS", self.lpos as i64);
        env.set_int("APOS", self.apos as i64);
        env.set_int("COL", self.col as i64);
        env.set_text("MATCH", &String::from_utf8_lossy(&self.matched));
        for (i, cap) in self.captures.iter().enumerate() {
            env.set_text(format!("CAP{}", i + 1), &String::from_utf8_lossy(cap));
        }
        env
    }
}

/// What to write for one match: `Ok(None)` means skip it.
fn replacement_for<B: TextBuffer + ?Sized>(
    buffer: &B,
    entry: &PatternEntry,
    template: &[u8],
    hit: &SearchResult,
    counts: (usize, usize),
    col: usize,
    evaluator: &mut dyn ExpressionEvaluator,
) -> std::result::Result<Option<Vec<u8>>, ScriptError> {
    if !entry.use_variables {
        return Ok(Some(template.to_vec()));
    }
    let ctx = MatchContext::capture(buffer, hit, counts, col, entry.regex);
    let eval = evaluator.evaluate(&String::from_utf8_lossy(template), &ctx.environment())?;
    Ok((!eval.skip).then(|| eval.text.into_bytes()))
}

/// Write `text` over `hit`, expanding back-references for regex entries.
/// Returns the end of the inserted text.  Selections shift with the edit.
fn write<B: TextBuffer + ?Sized>(buffer: &mut B, entry: &PatternEntry, hit: &SearchResult, text: &[u8]) -> usize {
    if entry.regex {
        buffer.replace_range_regex(hit.position, hit.end(), text)
    } else {
        buffer.replace_range(hit.position, hit.end(), text)
    }
}

// ── Replace one ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOneOutcome {
    pub replaced: bool,
    /// Where the next search should start.
    pub next_position: usize,
}

/// Replace the selected text if, and only if, it is exactly the next match
/// of `entry` from the selection start.
///
/// A script that asks to skip moves the caret past the match without
/// writing.  Script errors are returned; nothing is written in that case.
pub fn replace_one<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    entry: &PatternEntry,
    selection: SelectionRange,
    scope: &mut LiveScope<'_>,
    evaluator: &mut dyn ExpressionEvaluator,
) -> Result<ReplaceOneOutcome> {
    scope.refresh(buffer);
    let pattern = entry.find_bytes();
    let not_replaced = ReplaceOneOutcome { replaced: false, next_position: buffer.current_position() };

    let Some(hit) = search_forward(buffer, &pattern, entry.search_flags(), scope.scope()?, selection.start)? else {
        return Ok(not_replaced);
    };
    if hit.position != selection.start || hit.length != selection.len() {
        return Ok(not_replaced);
    }

    let col = scope.column_at(buffer, hit.position);
    let template = entry.replace_bytes();
    match replacement_for(buffer, entry, &template, &hit, (1, 1), col, evaluator)? {
        Some(text) => {
            let next_position = write(buffer, entry, &hit, &text);
            buffer.set_selection(SelectionRange::caret(next_position));
            scope.refresh(buffer);
            Ok(ReplaceOneOutcome { replaced: true, next_position })
        }
        None => {
            buffer.set_selection(SelectionRange::caret(hit.end()));
            Ok(ReplaceOneOutcome { replaced: false, next_position: hit.end() })
        }
    }
}

// ── Replace all ───────────────────────────────────────────────────────────────

/// Totals of a replace-all run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaceAllOutcome {
    pub replaced: usize,
    /// Matches left alone because their script failed at runtime.
    pub failed: usize,
    /// The first script error seen.  A syntax error also ended its entry.
    pub script_error: Option<ScriptError>,
}

impl ReplaceAllOutcome {
    fn absorb(&mut self, other: ReplaceAllOutcome) {
        self.replaced += other.replaced;
        self.failed += other.failed;
        if self.script_error.is_none() {
            self.script_error = other.script_error;
        }
    }
}

/// Replace every match of `entry` in scope as one undo step.
///
/// With `once` set the run stops after the first replacement.
pub fn replace_all<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    entry: &PatternEntry,
    scope: &mut LiveScope<'_>,
    evaluator: &mut dyn ExpressionEvaluator,
    once: bool,
) -> Result<ReplaceAllOutcome> {
    buffer.begin_undo_action();
    let outcome = replace_entry(buffer, entry, scope, evaluator, once);
    buffer.end_undo_action();
    outcome
}

/// `replace_all` for every enabled entry, in list order, as one undo step.
///
/// With `once` set each entry replaces at most one match and the list stops
/// after the first entry that replaced anything.
pub fn replace_all_in_list<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    list: &PatternList,
    scope: &mut LiveScope<'_>,
    evaluator: &mut dyn ExpressionEvaluator,
    once: bool,
) -> Result<ReplaceAllOutcome> {
    buffer.begin_undo_action();
    let mut total = ReplaceAllOutcome::default();
    let mut result = Ok(());
    for entry in list.enabled() {
        match replace_entry(buffer, entry, scope, evaluator, once) {
            Ok(outcome) => {
                let replaced = outcome.replaced;
                total.absorb(outcome);
                if once && replaced > 0 {
                    break;
                }
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    buffer.end_undo_action();
    result.map(|()| total)
}

fn replace_entry<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    entry: &PatternEntry,
    scope: &mut LiveScope<'_>,
    evaluator: &mut dyn ExpressionEvaluator,
    once: bool,
) -> Result<ReplaceAllOutcome> {
    let mut outcome = ReplaceAllOutcome::default();
    if entry.find_text.is_empty() {
        return Ok(outcome);
    }
    let pattern = entry.find_bytes();
    let template = entry.replace_bytes();
    let flags = entry.search_flags();

    scope.refresh(buffer);
    let mut pos = 0;
    let mut cnt = 0;
    let mut lcnt = 0;
    let mut last_line = None;

    while pos <= buffer.length() {
        let Some(hit) = search_forward(buffer, &pattern, flags, scope.scope()?, pos)? else {
            break;
        };

        let line = buffer.line_from_position(hit.position);
        if last_line != Some(line) {
            lcnt = 0;
            last_line = Some(line);
        }
        cnt += 1;
        lcnt += 1;

        let col = scope.column_at(buffer, hit.position);
        let text = match replacement_for(buffer, entry, &template, &hit, (cnt, lcnt), col, evaluator) {
            Ok(text) => text,
            Err(e) if e.is_fatal_for_batch() => {
                warn!(error = %e, "script syntax error, entry abandoned");
                outcome.script_error.get_or_insert(e);
                break;
            }
            Err(e) => {
                debug!(error = %e, position = hit.position, "script failed, match left unchanged");
                outcome.failed += 1;
                outcome.script_error.get_or_insert(e);
                None
            }
        };

        let next = match text {
            Some(text) => {
                let end = write(buffer, entry, &hit, &text);
                outcome.replaced += 1;
                scope.refresh(buffer);
                end
            }
            None => hit.end(),
        };
        if once && outcome.replaced > 0 {
            break;
        }
        // An empty match must not be found again at the same place.
        pos = if hit.length == 0 { next + 1 } else { next };
    }

    debug!(find = %entry.find_text, replaced = outcome.replaced, "replace all");
    Ok(outcome)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        columns::{ColumnDelimiterData, ColumnScope},
        editor::memory::MemoryBuffer,
        error::Error,
        script::TemplateEvaluator,
        search::scope::ScopeMode,
    };

    fn text(buf: &MemoryBuffer) -> String {
        String::from_utf8_lossy(buf.text()).into_owned()
    }

    fn all(buf: &mut MemoryBuffer, entry: &PatternEntry) -> ReplaceAllOutcome {
        let mut ev = TemplateEvaluator::new();
        replace_all(buf, entry, &mut LiveScope::document(), &mut ev, false).unwrap()
    }

    #[test]
    fn replace_all_literal_case_insensitive() {
        let mut buf = MemoryBuffer::new("cat\ncatalog\nCAT");
        let out = all(&mut buf, &PatternEntry::new("cat", "dog"));
        assert_eq!(out.replaced, 3);
        assert_eq!(text(&buf), "dog\ndogalog\ndog");
        assert_eq!(buf.undo_groups(), 1);
    }

    #[test]
    fn replace_all_whole_word_match_case() {
        let mut buf = MemoryBuffer::new("cat\ncatalog\nCAT");
        let entry = PatternEntry::new("cat", "dog").whole_word(true).match_case(true);
        assert_eq!(all(&mut buf, &entry).replaced, 1);
        assert_eq!(text(&buf), "dog\ncatalog\nCAT");
    }

    #[test]
    fn replacement_containing_pattern_is_not_rescanned() {
        let mut buf = MemoryBuffer::new("a a");
        assert_eq!(all(&mut buf, &PatternEntry::new("a", "aa")).replaced, 2);
        assert_eq!(text(&buf), "aa aa");
    }

    #[test]
    fn empty_regex_matches_make_progress() {
        let mut buf = MemoryBuffer::new("ab");
        let entry = PatternEntry::new("x*", "-").regex(true);
        let out = all(&mut buf, &entry);
        assert_eq!(text(&buf), "-a-b-");
        assert_eq!(out.replaced, 3);
    }

    #[test]
    fn regex_back_references() {
        let mut buf = MemoryBuffer::new("a=1\nb=2");
        let entry = PatternEntry::new(r"(\w)=(\d)", r"$2=$1").regex(true);
        all(&mut buf, &entry);
        assert_eq!(text(&buf), "1=a\n2=b");
    }

    #[test]
    fn counters_and_positions() {
        let mut buf = MemoryBuffer::new("x x\nx");
        let entry = PatternEntry::new("x", "set(CNT..LCNT..LINE..LPOS..APOS)").use_variables(true);
        let out = all(&mut buf, &entry);
        assert_eq!(out.replaced, 3);
        // positions are taken after the earlier replacements
        assert_eq!(text(&buf), "11111 22177\n312113");
    }

    #[test]
    fn captures_are_visible_to_scripts() {
        let mut buf = MemoryBuffer::new("k=v");
        let entry = PatternEntry::new(r"(\w)=(\w)", "set(CAP2..CAP1)").regex(true).use_variables(true);
        all(&mut buf, &entry);
        assert_eq!(text(&buf), "vk");
    }

    #[test]
    fn skip_leaves_match() {
        let mut buf = MemoryBuffer::new("1 2 3");
        let entry = PatternEntry::new(r"\d", "cond(MATCH > 1, 'n')").regex(true).use_variables(true);
        let out = all(&mut buf, &entry);
        assert_eq!(out.replaced, 2);
        assert_eq!(text(&buf), "1 n n");
    }

    #[test]
    fn syntax_error_aborts_runtime_error_continues() {
        let mut buf = MemoryBuffer::new("a a");
        let out = all(&mut buf, &PatternEntry::new("a", "set(").use_variables(true));
        assert_eq!(out.replaced, 0);
        assert!(matches!(out.script_error, Some(ScriptError::Syntax { .. })));
        assert_eq!(text(&buf), "a a");

        let entry = PatternEntry::new(r"\w", "set(1 // (APOS - 1))").regex(true).use_variables(true);
        let out = all(&mut buf, &entry);
        assert_eq!(out.failed, 1);
        assert_eq!(out.replaced, 1);
        assert!(matches!(out.script_error, Some(ScriptError::Runtime { .. })));
        assert_eq!(text(&buf), "a 0");
    }

    #[test]
    fn replace_one_requires_exact_selection() {
        let mut buf = MemoryBuffer::new("foo bar foo");
        let entry = PatternEntry::new("foo", "X");
        let mut ev = TemplateEvaluator::new();

        // selection does not cover a match
        buf.set_selection(SelectionRange::new(0, 2));
        let out = replace_one(&mut buf, &entry, SelectionRange::new(0, 2), &mut LiveScope::document(), &mut ev)
            .unwrap();
        assert!(!out.replaced);
        assert_eq!(text(&buf), "foo bar foo");

        buf.set_selection(SelectionRange::new(8, 11));
        let out = replace_one(&mut buf, &entry, SelectionRange::new(8, 11), &mut LiveScope::document(), &mut ev)
            .unwrap();
        assert_eq!(out, ReplaceOneOutcome { replaced: true, next_position: 9 });
        assert_eq!(text(&buf), "foo bar X");
        assert_eq!(buf.main_selection(), SelectionRange::caret(9));
    }

    #[test]
    fn replace_one_skip_moves_caret() {
        let mut buf = MemoryBuffer::new("abc");
        let entry = PatternEntry::new("b", "cond(false, 'x')").use_variables(true);
        let mut ev = TemplateEvaluator::new();
        let out = replace_one(&mut buf, &entry, SelectionRange::new(1, 2), &mut LiveScope::document(), &mut ev)
            .unwrap();
        assert_eq!(out, ReplaceOneOutcome { replaced: false, next_position: 2 });
        assert_eq!(text(&buf), "abc");
    }

    #[test]
    fn replace_one_script_error_is_returned() {
        let mut buf = MemoryBuffer::new("abc");
        let entry = PatternEntry::new("b", "nope()").use_variables(true);
        let mut ev = TemplateEvaluator::new();
        let err = replace_one(&mut buf, &entry, SelectionRange::new(1, 2), &mut LiveScope::document(), &mut ev)
            .unwrap_err();
        assert!(matches!(err, Error::Script(ScriptError::Runtime { .. })));
        assert_eq!(text(&buf), "abc");
    }

    #[test]
    fn list_once_stops_after_first_replacing_entry() {
        let list: PatternList = [
            PatternEntry::new("zzz", "never"),
            PatternEntry::new("a", "1"),
            PatternEntry::new("b", "2"),
        ]
        .into_iter()
        .collect();
        let mut ev = TemplateEvaluator::new();

        let mut buf = MemoryBuffer::new("a b a b");
        let out = replace_all_in_list(&mut buf, &list, &mut LiveScope::document(), &mut ev, true).unwrap();
        assert_eq!(out.replaced, 1);
        assert_eq!(text(&buf), "1 b a b");

        let mut buf = MemoryBuffer::new("a b a b");
        let out = replace_all_in_list(&mut buf, &list, &mut LiveScope::document(), &mut ev, false).unwrap();
        assert_eq!(out.replaced, 4);
        assert_eq!(text(&buf), "1 2 1 2");
        assert_eq!(buf.undo_groups(), 1);
    }

    #[test]
    fn column_scope_only_touches_selected_columns() {
        let mut buf = MemoryBuffer::new("a,b,c\na,b,c");
        let data = ColumnDelimiterData::parse("2", ",", "").unwrap();
        let mut columns = ColumnScope::new(&buf, data);
        let mut live = LiveScope::new(ScopeMode::Columns, Some(&mut columns));
        let mut ev = TemplateEvaluator::new();

        let entry = PatternEntry::new(r"\w", "set(MATCH..COL..'x')").regex(true).use_variables(true);
        let out = replace_all(&mut buf, &entry, &mut live, &mut ev, false).unwrap();
        assert_eq!(out.replaced, 2);
        assert_eq!(text(&buf), "a,b2x,c\na,b2x,c");
        columns.index().check_invariants().unwrap();
    }

    #[test]
    fn selection_scope() {
        let mut buf = MemoryBuffer::new("aaaa");
        buf.set_selections(vec![SelectionRange::new(1, 3)]);
        let mut live = LiveScope::new(ScopeMode::Selection, None);
        let mut ev = TemplateEvaluator::new();
        let out = replace_all(&mut buf, &PatternEntry::new("a", "b"), &mut live, &mut ev, false).unwrap();
        assert_eq!(out.replaced, 2);
        assert_eq!(text(&buf), "abba");
    }
}
