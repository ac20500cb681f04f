// ── Scope resolution ──────────────────────────────────────────────────────────
//
// Turns "search from here, in this scope, in this direction" into the ordered
// list of targets to try.  The first target that yields a match wins, so the
// order matters: nearest to `start` first.

use serde::{Deserialize, Serialize};

use crate::{
    columns::{ColumnScope, DelimiterIndex},
    editor::{TextBuffer, Target},
    error::UserInputError,
};

/// Where searches and replacements are allowed to look.  Persisted in the
/// settings file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    #[default]
    Document,
    Selection,
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A resolved scope, ready to produce targets.  Column scope borrows the
/// delimiter index, which must be reconciled before it is used here.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Document,
    Selection,
    Columns(&'a DelimiterIndex),
}

impl Scope<'_> {
    pub fn mode(&self) -> ScopeMode {
        match self {
            Scope::Document => ScopeMode::Document,
            Scope::Selection => ScopeMode::Selection,
            Scope::Columns(_) => ScopeMode::Columns,
        }
    }
}

/// Targets for a search starting at `start`.
///
/// Backward targets carry `start > end` as the buffer expects.  An empty
/// result means nothing in scope lies in the requested direction.
pub fn resolve<B: TextBuffer + ?Sized>(
    buffer: &B,
    scope: Scope<'_>,
    start: usize,
    direction: Direction,
) -> Vec<Target> {
    let len = buffer.length();
    let start = start.min(len);
    match (scope, direction) {
        (Scope::Document, Direction::Forward) => vec![Target::forward(start, len)],
        (Scope::Document, Direction::Backward) => vec![Target::backward(start, 0)],
        (Scope::Selection, dir) => selection_targets(buffer, start, dir),
        (Scope::Columns(index), dir) => column_targets(buffer, index, start, dir),
    }
}

fn selection_targets<B: TextBuffer + ?Sized>(
    buffer: &B,
    start: usize,
    direction: Direction,
) -> Vec<Target> {
    let mut selections = buffer.selections();
    selections.retain(|s| !s.is_empty());
    selections.sort();

    match direction {
        Direction::Forward => selections
            .into_iter()
            .filter(|s| start < s.end)
            .map(|s| Target::forward(s.start.max(start), s.end))
            .collect(),
        Direction::Backward => selections
            .into_iter()
            .rev()
            .filter(|s| start > s.start)
            .map(|s| Target::backward(s.end.min(start), s.start))
            .collect(),
    }
}

fn column_targets<B: TextBuffer + ?Sized>(
    buffer: &B,
    index: &DelimiterIndex,
    start: usize,
    direction: Direction,
) -> Vec<Target> {
    if index.is_empty() || !index.data().is_valid() {
        return Vec::new();
    }
    let first = buffer.line_from_position(start).min(index.len() - 1);
    let mut out = Vec::new();

    match direction {
        Direction::Forward => {
            for line in first..index.len() {
                for (_, s, e) in index.selected_columns(line) {
                    if line == first {
                        if e < start {
                            continue;
                        }
                        out.push(Target::forward(s.max(start), e));
                    } else {
                        out.push(Target::forward(s, e));
                    }
                }
            }
        }
        Direction::Backward => {
            for line in (0..=first).rev() {
                for (_, s, e) in index.selected_columns(line).into_iter().rev() {
                    if line == first {
                        if s > start {
                            continue;
                        }
                        out.push(Target::backward(e.min(start), s));
                    } else {
                        out.push(Target::backward(e, s));
                    }
                }
            }
        }
    }
    out
}

// ── LiveScope ─────────────────────────────────────────────────────────────────

/// The scope of an operation that edits as it goes.
///
/// Column targets are derived from the delimiter index, so after every edit
/// `refresh` has to fold the buffer's notifications back into it before the
/// next `scope()` call.
pub struct LiveScope<'a> {
    mode: ScopeMode,
    columns: Option<&'a mut ColumnScope>,
}

impl<'a> LiveScope<'a> {
    pub fn new(mode: ScopeMode, columns: Option<&'a mut ColumnScope>) -> Self {
        Self { mode, columns }
    }

    pub fn document() -> Self {
        Self { mode: ScopeMode::Document, columns: None }
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    /// The scope to resolve targets against right now.
    pub fn scope(&self) -> Result<Scope<'_>, UserInputError> {
        match self.mode {
            ScopeMode::Document => Ok(Scope::Document),
            ScopeMode::Selection => Ok(Scope::Selection),
            ScopeMode::Columns => self
                .columns
                .as_deref()
                .filter(|c| c.data().is_valid())
                .map(|c| Scope::Columns(c.index()))
                .ok_or(UserInputError::ColumnScopeUnset),
        }
    }

    /// 1-based column of `pos` in column scope, 0 in any other scope.
    pub fn column_at<B: TextBuffer + ?Sized>(&self, buffer: &B, pos: usize) -> usize {
        match (self.mode, self.columns.as_deref()) {
            (ScopeMode::Columns, Some(c)) => c.index().column_info(buffer, pos).map_or(0, |i| i.column),
            _ => 0,
        }
    }

    /// Consume the buffer's pending notifications.
    pub fn refresh<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) {
        let changes = buffer.take_modifications();
        if let Some(columns) = self.columns.as_deref_mut() {
            for change in &changes {
                columns.record(change);
            }
            columns.reconcile(buffer);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
