// ── Engine ────────────────────────────────────────────────────────────────────
//
// One `Engine` per open document.  It owns the buffer adapter, the pattern
// list, the column scope and the mark styles, and turns each user action
// (find next, replace, mark ...) into calls on the lower layers followed by
// exactly one piece of feedback through the `Notifier`.
//
// Ordering inside every operation: drain pending edits into the column
// index, resolve the scope, then search.
//
// Find, find-previous and single replace select what they find, which would
// shrink a selection scope to the match.  Those three therefore search the
// whole document when the scope is `Selection`; replace-all and mark honour
// it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    columns::{ColumnDelimiterData, ColumnScope},
    editor::{Modification, SelectionRange, TextBuffer},
    error::{Error, Result, ScriptError, UserInputError},
    mark::{self, MarkTracker, MarkedText},
    pattern::{PatternEntry, PatternList},
    report::{truncate_status, Notifier, StatusLevel, TracingNotifier},
    script::{ExpressionEvaluator, TemplateEvaluator},
    search::{
        find_with_wrap,
        replace::{self, ReplaceAllOutcome},
        scope::{Direction, LiveScope, ScopeMode},
        search, search_list, FindOutcome,
    },
};

// ── Options ───────────────────────────────────────────────────────────────────

/// Dialog switches that apply to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub wrap_around: bool,
    /// Operate on the enabled list entries instead of the input fields.
    pub use_list: bool,
    /// List replace-all stops after the first entry that replaced.
    pub replace_once_in_list: bool,
    pub scope: ScopeMode,
    /// Do not forward script errors to the notifier.
    pub suppress_script_errors: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            wrap_around: true,
            use_list: false,
            replace_once_in_list: false,
            scope: ScopeMode::Document,
            suppress_script_errors: false,
        }
    }
}

/// Scope for operations that select their match.
fn interactive(mode: ScopeMode) -> ScopeMode {
    match mode {
        ScopeMode::Selection => ScopeMode::Document,
        other => other,
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct Engine<B: TextBuffer> {
    buffer: B,
    evaluator: Box<dyn ExpressionEvaluator>,
    notifier: Box<dyn Notifier>,
    options: SearchOptions,
    input: PatternEntry,
    list: PatternList,
    columns: Option<ColumnScope>,
    columns_highlighted: bool,
    marks: MarkTracker,
}

impl<B: TextBuffer> Engine<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            evaluator: Box::new(TemplateEvaluator::new()),
            notifier: Box::new(TracingNotifier::new()),
            options: SearchOptions::default(),
            input: PatternEntry::new("", ""),
            list: PatternList::new(),
            columns: None,
            columns_highlighted: false,
            marks: MarkTracker::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SearchOptions {
        &mut self.options
    }

    /// The entry described by the find/replace input fields.
    pub fn input(&self) -> &PatternEntry {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut PatternEntry {
        &mut self.input
    }

    pub fn list(&self) -> &PatternList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut PatternList {
        &mut self.list
    }

    pub fn marks(&self) -> &MarkTracker {
        &self.marks
    }

    pub fn column_scope(&self) -> Option<&ColumnScope> {
        self.columns.as_ref()
    }

    // ── Column scope ──────────────────────────────────────────────────────────

    /// Parse the column settings and index the whole document.
    pub fn set_column_scope(&mut self, columns: &str, delimiter: &str, quote: &str) -> Result<()> {
        let data = match ColumnDelimiterData::parse(columns, delimiter, quote) {
            Ok(data) => data,
            Err(e) => return self.reject(e.into()),
        };
        // Edits made before this point are already in the scan.
        self.buffer.take_modifications();
        self.columns = Some(ColumnScope::new(&self.buffer, data));
        info!(columns, delimiter, "column scope set");
        Ok(())
    }

    pub fn clear_column_scope(&mut self) {
        if self.columns_highlighted {
            self.clear_column_highlights();
        }
        self.columns = None;
    }

    /// Queue a change notification from the host.  Applied lazily, at the
    /// start of the next operation.
    ///
    /// Only for buffers that do not queue their own modifications.  Edits
    /// reported by `TextBuffer::take_modifications` (`MemoryBuffer`, or a
    /// `ScintillaBuffer` fed through `on_modified`) are already picked up, and
    /// passing them here as well records every edit twice.
    pub fn notify(&mut self, change: Modification) {
        if let Some(columns) = self.columns.as_mut() {
            columns.record(&change);
        }
    }

    /// The host switched this engine's adapter to another document.
    pub fn document_switched(&mut self) {
        self.buffer.take_modifications();
        if let Some(columns) = self.columns.as_mut() {
            columns.rebuild(&self.buffer);
        }
        self.columns_highlighted = false;
        self.marks = MarkTracker::new();
        self.notifier.status(StatusLevel::Info, "");
        debug!("document switched");
    }

    /// Paint the selected columns.
    pub fn highlight_columns(&mut self) -> Result<()> {
        self.sync();
        let Some(columns) = self.columns.as_ref() else {
            return self.reject(UserInputError::ColumnScopeUnset.into());
        };
        mark::highlight_columns(&mut self.buffer, columns.index());
        self.columns_highlighted = true;
        let pos = self.buffer.current_position();
        let message = format!("Actual Position {}", self.position_message(pos));
        self.status(StatusLevel::Success, &message);
        Ok(())
    }

    pub fn clear_column_highlights(&mut self) {
        mark::clear_column_highlights(&mut self.buffer);
        self.columns_highlighted = false;
    }

    /// Show the caret's line and column while columns are highlighted.
    pub fn caret_moved(&mut self) {
        if !self.columns_highlighted {
            return;
        }
        self.sync();
        let pos = self.buffer.current_position();
        let message = format!("Actual Position {}", self.position_message(pos));
        self.status(StatusLevel::Success, &message);
    }

    /// "(Line: L, Column: C)" for `pos`, or an empty string without a
    /// column scope.
    pub fn position_message(&self, pos: usize) -> String {
        self.columns
            .as_ref()
            .and_then(|c| c.index().column_info(&self.buffer, pos))
            .map(|info| format!("(Line: {}, Column: {})", info.line + 1, info.column))
            .unwrap_or_default()
    }

    // ── Find ──────────────────────────────────────────────────────────────────

    /// Select the next match after the caret.
    pub fn find_next(&mut self) -> Result<FindOutcome> {
        let start = self.buffer.current_position();
        let outcome = self.find(start, Direction::Forward);
        self.report(outcome)
    }

    /// Select the previous match before the caret.
    pub fn find_previous(&mut self) -> Result<FindOutcome> {
        let start = self.buffer.current_position().saturating_sub(1);
        let outcome = self.find(start, Direction::Backward);
        self.report(outcome)
    }

    fn find(&mut self, start: usize, direction: Direction) -> Result<FindOutcome> {
        self.check_input()?;
        let outcome = self.locate(start, direction)?;

        let label = self.label();
        let (level, message) = match &outcome.result {
            Some(hit) => {
                self.buffer.set_selection(hit.range());
                let position = self.position_message(hit.position);
                let message = match (outcome.wrapped, position.is_empty()) {
                    (false, _) => position,
                    (true, true) => "Wrapped".to_owned(),
                    (true, false) => format!("Wrapped {position}"),
                };
                (StatusLevel::Success, message)
            }
            None if self.options.wrap_around => {
                (StatusLevel::Error, format!("No matches found{label} after wrap."))
            }
            None => (StatusLevel::Error, format!("No matches found{label}.")),
        };
        self.status(level, &message);
        Ok(outcome)
    }

    /// Search from `start` with the current input or list, wrapping if
    /// enabled.  Selects nothing.
    fn locate(&mut self, start: usize, direction: Direction) -> Result<FindOutcome> {
        let use_list = self.options.use_list;
        let input = &self.input;
        let list = &self.list;
        let pattern = input.find_bytes();
        let flags = input.search_flags();

        let mut live = LiveScope::new(interactive(self.options.scope), self.columns.as_mut());
        live.refresh(&mut self.buffer);
        let scope = live.scope()?;
        find_with_wrap(&mut self.buffer, start, direction, self.options.wrap_around, |b, from| {
            if use_list {
                search_list(b, list, scope, from, direction)
            } else {
                search(b, &pattern, flags, scope, from, direction)
            }
        })
    }

    // ── Replace ───────────────────────────────────────────────────────────────

    /// Replace the selection if it is a match, then select the next match.
    /// Returns whether anything was written.
    pub fn replace(&mut self) -> Result<bool> {
        let outcome = self.replace_selected();
        self.report(outcome)
    }

    fn replace_selected(&mut self) -> Result<bool> {
        self.check_writable()?;
        self.check_input()?;

        let selection = self.buffer.main_selection();
        let mut next = self.buffer.current_position();
        let mut replaced = false;
        {
            let entries: Vec<&PatternEntry> = if self.options.use_list {
                self.list.enabled().collect()
            } else {
                vec![&self.input]
            };
            let mut live = LiveScope::new(interactive(self.options.scope), self.columns.as_mut());
            for entry in entries {
                let out = replace::replace_one(
                    &mut self.buffer,
                    entry,
                    selection,
                    &mut live,
                    self.evaluator.as_mut(),
                )?;
                next = out.next_position;
                // The selection is gone once something was written.
                if out.replaced {
                    replaced = true;
                    break;
                }
            }
        }

        let found = self.locate(next, Direction::Forward)?.result;
        if let Some(hit) = &found {
            self.buffer.set_selection(hit.range());
        }
        let list = self.options.use_list;
        match (replaced, found.is_some()) {
            (true, true) if list => self.status(StatusLevel::Success, "Replace: 1 replaced. Next occurrence found."),
            (true, false) if list => self.status(StatusLevel::Error, "Replace: 1 replaced. None left."),
            (true, true) => self.status(StatusLevel::Success, "Replace: 1 occurrence replaced. Next found."),
            (true, false) => self.status(StatusLevel::Error, "Replace: 1 occurrence replaced. None left."),
            (false, true) => self.status(StatusLevel::Success, ""),
            (false, false) => self.status(StatusLevel::Error, "No occurrence found."),
        }
        Ok(replaced)
    }

    /// Replace every match in scope as one undo step.
    pub fn replace_all(&mut self) -> Result<ReplaceAllOutcome> {
        let outcome = self.replace_everything();
        self.report(outcome)
    }

    fn replace_everything(&mut self) -> Result<ReplaceAllOutcome> {
        self.check_writable()?;
        self.check_input()?;

        let outcome = {
            let mut live = LiveScope::new(self.options.scope, self.columns.as_mut());
            live.refresh(&mut self.buffer);
            live.scope()?;
            let evaluator = self.evaluator.as_mut();
            if self.options.use_list {
                let once = self.options.replace_once_in_list;
                replace::replace_all_in_list(&mut self.buffer, &self.list, &mut live, evaluator, once)?
            } else {
                replace::replace_all(&mut self.buffer, &self.input, &mut live, evaluator, false)?
            }
        };

        if let Some(e) = &outcome.script_error {
            self.script_error(e);
        }
        self.status(StatusLevel::Success, &format!("{} occurrences were replaced.", outcome.replaced));
        Ok(outcome)
    }

    // ── Mark ──────────────────────────────────────────────────────────────────

    /// Highlight every match in scope.  Returns the number of matches.
    pub fn mark(&mut self) -> Result<usize> {
        let outcome = self.mark_matches();
        self.report(outcome)
    }

    fn mark_matches(&mut self) -> Result<usize> {
        self.check_input()?;
        let count = {
            let mut live = LiveScope::new(self.options.scope, self.columns.as_mut());
            live.refresh(&mut self.buffer);
            let scope = live.scope()?;
            if self.options.use_list {
                self.marks.mark_list(&mut self.buffer, &self.list, scope)?
            } else {
                let pattern = self.input.find_bytes();
                self.marks.mark_all(&mut self.buffer, &pattern, self.input.search_flags(), scope)?
            }
        };
        self.status(StatusLevel::Info, &format!("{count} occurrences were marked."));
        Ok(count)
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear_all(&mut self.buffer);
    }

    /// Collect the marked text for the clipboard.
    pub fn copy_marked_text(&mut self) -> MarkedText {
        let marked = self.marks.extract_marked_text(&self.buffer);
        if marked.blocks > 0 {
            self.status(StatusLevel::Success, &format!("{} marked blocks copied into Clipboard.", marked.blocks));
        } else {
            self.status(StatusLevel::Error, "No marked text to copy.");
        }
        marked
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Fold pending edits into the column index.
    fn sync(&mut self) {
        LiveScope::new(self.options.scope, self.columns.as_mut()).refresh(&mut self.buffer);
    }

    fn check_writable(&self) -> std::result::Result<(), UserInputError> {
        if self.buffer.is_read_only() {
            return Err(UserInputError::ReadOnly);
        }
        Ok(())
    }

    fn check_input(&self) -> std::result::Result<(), UserInputError> {
        if self.options.use_list {
            if self.list.is_empty() {
                return Err(UserInputError::EmptyList);
            }
        } else if self.input.find_text.is_empty() {
            return Err(UserInputError::EmptyPattern);
        }
        Ok(())
    }

    /// " for 'text'" when searching the input fields.
    fn label(&self) -> String {
        if self.options.use_list {
            String::new()
        } else {
            format!(" for '{}'", self.input.find_text)
        }
    }

    fn status(&mut self, level: StatusLevel, message: &str) {
        self.notifier.status(level, &truncate_status(message));
    }

    fn script_error(&mut self, error: &ScriptError) {
        if !self.options.suppress_script_errors {
            self.notifier.script_error(error);
        }
    }

    /// Tell the user about a failed operation and hand the error back.
    fn report<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            match e {
                Error::Script(s) => {
                    let s = s.clone();
                    self.script_error(&s);
                }
                other => {
                    let message = other.to_string();
                    self.status(StatusLevel::Error, &message);
                }
            }
        }
        outcome
    }

    fn reject<T>(&mut self, error: Error) -> Result<T> {
        self.report(Err(error))
    }
}

impl Engine<crate::editor::memory::MemoryBuffer> {
    /// Place the caret, for callers driving the in-memory buffer.
    pub fn set_caret(&mut self, pos: usize) {
        self.buffer.set_selection(SelectionRange::caret(pos));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
