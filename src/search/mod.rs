// ── Search engine ─────────────────────────────────────────────────────────────
//
// Pure search logic on top of `TextBuffer::search_in_range`.  Nothing here
// moves the caret or reports status; the engine decides what to do with a
// result.  Scope resolution lives in `scope`, replacement in `replace`.

use tracing::trace;

use crate::{
    editor::{SearchFlags, SelectionRange, Target, TextBuffer},
    error::Result,
    pattern::PatternList,
};

pub mod replace;
pub mod scope;

use scope::{Direction, Scope};

/// Matched text beyond this many bytes is cut off in `SearchResult`.  The
/// match itself (`position`, `length`) is never truncated.
pub const MAX_MATCH_TEXT: usize = 4096;

/// One match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub position: usize,
    pub length: usize,
    /// At most `MAX_MATCH_TEXT` bytes of the match.
    pub matched_text: Vec<u8>,
}

impl SearchResult {
    pub fn end(&self) -> usize {
        self.position + self.length
    }

    pub fn range(&self) -> SelectionRange {
        SelectionRange::new(self.position, self.end())
    }
}

/// Search one target.  An empty pattern never matches.
pub fn single_search<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    pattern: &[u8],
    flags: SearchFlags,
    target: Target,
) -> Result<Option<SearchResult>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    let Some((position, length)) = buffer.search_in_range(pattern, flags, target)? else {
        return Ok(None);
    };
    let shown = length.min(MAX_MATCH_TEXT);
    let matched_text = buffer.text_range(position, position + shown);
    Ok(Some(SearchResult { position, length, matched_text }))
}

/// First match in scope, walking the resolved targets in order.
pub fn search<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    pattern: &[u8],
    flags: SearchFlags,
    scope: Scope<'_>,
    start: usize,
    direction: Direction,
) -> Result<Option<SearchResult>> {
    for target in scope::resolve(buffer, scope, start, direction) {
        if let Some(hit) = single_search(buffer, pattern, flags, target)? {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

pub fn search_forward<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    pattern: &[u8],
    flags: SearchFlags,
    scope: Scope<'_>,
    start: usize,
) -> Result<Option<SearchResult>> {
    search(buffer, pattern, flags, scope, start, Direction::Forward)
}

pub fn search_backward<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    pattern: &[u8],
    flags: SearchFlags,
    scope: Scope<'_>,
    start: usize,
) -> Result<Option<SearchResult>> {
    search(buffer, pattern, flags, scope, start, Direction::Backward)
}

// ── List search ───────────────────────────────────────────────────────────────

/// The match closest to `start` over every enabled entry.
///
/// Forward keeps the smallest position; backward keeps the largest match
/// end.  Ties go to the earlier entry.
pub fn search_list<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    list: &PatternList,
    scope: Scope<'_>,
    start: usize,
    direction: Direction,
) -> Result<Option<SearchResult>> {
    let mut best: Option<SearchResult> = None;
    for entry in list.enabled() {
        let pattern = entry.find_bytes();
        let Some(hit) = search(buffer, &pattern, entry.search_flags(), scope, start, direction)? else {
            continue;
        };
        let closer = match (&best, direction) {
            (None, _) => true,
            (Some(b), Direction::Forward) => hit.position < b.position,
            (Some(b), Direction::Backward) => hit.end() > b.end(),
        };
        if closer {
            best = Some(hit);
        }
    }
    Ok(best)
}

// ── Wrap-around ───────────────────────────────────────────────────────────────

/// Result of a find that may have wrapped past the document edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOutcome {
    pub result: Option<SearchResult>,
    /// The hit came from the second, wrapped attempt.
    pub wrapped: bool,
}

/// Run `attempt` from `start`; if that finds nothing and `wrap_around` is
/// on, run it once more from the document edge (0 forward, the end
/// backward).
pub fn find_with_wrap<B, F>(
    buffer: &mut B,
    start: usize,
    direction: Direction,
    wrap_around: bool,
    mut attempt: F,
) -> Result<FindOutcome>
where
    B: TextBuffer + ?Sized,
    F: FnMut(&mut B, usize) -> Result<Option<SearchResult>>,
{
    if let Some(hit) = attempt(buffer, start)? {
        return Ok(FindOutcome { result: Some(hit), wrapped: false });
    }
    if !wrap_around {
        return Ok(FindOutcome { result: None, wrapped: false });
    }
    let edge = match direction {
        Direction::Forward => 0,
        Direction::Backward => buffer.length(),
    };
    trace!(?direction, edge, "search wrapped");
    let result = attempt(buffer, edge)?;
    let wrapped = result.is_some();
    Ok(FindOutcome { result, wrapped })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{editor::memory::MemoryBuffer, pattern::PatternEntry};

    fn literal() -> SearchFlags {
        SearchFlags { match_case: true, ..SearchFlags::default() }
    }

    #[test]
    fn single_search_reports_text() {
        let mut buf = MemoryBuffer::new("one two three");
        let hit = single_search(&mut buf, b"two", literal(), Target::forward(0, 13)).unwrap().unwrap();
        assert_eq!((hit.position, hit.length, hit.end()), (4, 3, 7));
        assert_eq!(hit.matched_text, b"two");
        assert_eq!(single_search(&mut buf, b"", literal(), Target::forward(0, 13)).unwrap(), None);
    }

    #[test]
    fn matched_text_is_truncated() {
        let text = "x".repeat(MAX_MATCH_TEXT + 10);
        let mut buf = MemoryBuffer::new(text.as_str());
        let flags = SearchFlags { regex: true, ..literal() };
        let len = buf.length();
        let hit = single_search(&mut buf, b"x+", flags, Target::forward(0, len))
            .unwrap()
            .unwrap();
        assert_eq!(hit.length, MAX_MATCH_TEXT + 10);
        assert_eq!(hit.matched_text.len(), MAX_MATCH_TEXT);
    }

    #[test]
    fn forward_and_backward() {
        let mut buf = MemoryBuffer::new("ab ab ab");
        let f = search_forward(&mut buf, b"ab", literal(), Scope::Document, 1).unwrap().unwrap();
        assert_eq!(f.position, 3);
        let b = search_backward(&mut buf, b"ab", literal(), Scope::Document, 5).unwrap().unwrap();
        assert_eq!(b.position, 3);
    }

    #[test]
    fn list_search_picks_nearest() {
        let mut buf = MemoryBuffer::new("alpha beta gamma");
        let list: PatternList = [
            PatternEntry::new("gamma", ""),
            PatternEntry::new("beta", ""),
            PatternEntry::new("alpha", "").enabled(false),
        ]
        .into_iter()
        .collect();

        let f = search_list(&mut buf, &list, Scope::Document, 0, Direction::Forward).unwrap().unwrap();
        assert_eq!(f.matched_text, b"beta");
        let b = search_list(&mut buf, &list, Scope::Document, 16, Direction::Backward).unwrap().unwrap();
        assert_eq!(b.matched_text, b"gamma");
        // disabled entries never match
        let none = search_list(&mut buf, &list, Scope::Document, 0, Direction::Backward).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn wrap_around_retries_from_edge() {
        let mut buf = MemoryBuffer::new("cat dog");
        let find = |b: &mut MemoryBuffer, from: usize| search_forward(b, b"cat", literal(), Scope::Document, from);

        let out = find_with_wrap(&mut buf, 4, Direction::Forward, false, find).unwrap();
        assert_eq!(out, FindOutcome { result: None, wrapped: false });

        let out = find_with_wrap(&mut buf, 4, Direction::Forward, true, find).unwrap();
        assert!(out.wrapped);
        assert_eq!(out.result.map(|r| r.position), Some(0));

        let back = |b: &mut MemoryBuffer, from: usize| search_backward(b, b"dog", literal(), Scope::Document, from);
        let out = find_with_wrap(&mut buf, 2, Direction::Backward, true, back).unwrap();
        assert!(out.wrapped);
        assert_eq!(out.result.map(|r| r.position), Some(4));
    }

    #[test]
    fn invalid_regex_propagates() {
        let mut buf = MemoryBuffer::new("x");
        let flags = SearchFlags { regex: true, ..SearchFlags::default() };
        assert!(search_forward(&mut buf, b"[", flags, Scope::Document, 0).is_err());
    }
}
