// ── Buffer change log ─────────────────────────────────────────────────────────
//
// Append-only queue of line-level changes, fed from the host's modification
// notifications and drained by `DelimiterIndex::reconcile`.  Line numbers are
// the ones current when each notification was delivered, so the queue only
// makes sense when replayed in order.

use crate::editor::{Modification, ModificationKind};

/// One line-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLogEntry {
    /// A new line now exists at this index.
    Insert(usize),
    /// The line at this index is gone.
    Delete(usize),
    /// The content of this line changed.
    Modify(usize),
}

/// Pending changes not yet applied to the index.
#[derive(Debug, Default, Clone)]
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Hand every queued entry to the caller, oldest first.
    pub fn drain(&mut self) -> Vec<ChangeLogEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Queue `Modify(line)` unless the newest entry already says so.
    fn modify(&mut self, line: usize) {
        if self.entries.last() != Some(&ChangeLogEntry::Modify(line)) {
            self.entries.push(ChangeLogEntry::Modify(line));
        }
    }

    /// Translate one modification notification into line entries.
    ///
    /// * insert adding `n` lines at line `L`: `Modify(L)`, `Insert(L+1)` ..
    ///   `Insert(L+n)`
    /// * delete removing `n` lines at line `L`: `Delete(L+n)` .. `Delete(L+1)`
    ///   (descending), then `Modify(L)`; an empty delete at position 0 is a
    ///   bare `Delete(0)`
    /// * anything else: `Modify(L)`, coalesced with an identical newest entry
    pub fn record(&mut self, change: &Modification) {
        let line = change.line;
        let lines = change.lines_added.unsigned_abs();

        match change.kind {
            ModificationKind::Insert if lines != 0 => {
                self.entries.push(ChangeLogEntry::Modify(line));
                self.entries
                    .extend((1..=lines).map(|i| ChangeLogEntry::Insert(line + i)));
            }
            ModificationKind::Delete if lines != 0 => {
                if change.position == 0 && change.length == 0 {
                    self.entries.push(ChangeLogEntry::Delete(0));
                    return;
                }
                self.entries
                    .extend((1..=lines).rev().map(|i| ChangeLogEntry::Delete(line + i)));
                self.entries.push(ChangeLogEntry::Modify(line));
            }
            _ => self.modify(line),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ChangeLogEntry::*;

    fn change(kind: ModificationKind, position: usize, length: usize, lines_added: isize, line: usize) -> Modification {
        Modification { kind, position, length, lines_added, line }
    }

    #[test]
    fn typing_on_one_line_coalesces() {
        let mut log = ChangeLog::new();
        log.record(&change(ModificationKind::Insert, 3, 1, 0, 2));
        log.record(&change(ModificationKind::Insert, 4, 1, 0, 2));
        log.record(&change(ModificationKind::Delete, 4, 1, 0, 2));
        assert_eq!(log.entries(), &[Modify(2)]);
        log.record(&change(ModificationKind::Insert, 0, 1, 0, 0));
        log.record(&change(ModificationKind::Insert, 3, 1, 0, 2));
        assert_eq!(log.entries(), &[Modify(2), Modify(0), Modify(2)]);
    }

    #[test]
    fn multi_line_insert() {
        let mut log = ChangeLog::new();
        log.record(&change(ModificationKind::Insert, 10, 4, 2, 1));
        assert_eq!(log.entries(), &[Modify(1), Insert(2), Insert(3)]);
    }

    #[test]
    fn multi_line_delete_is_descending() {
        let mut log = ChangeLog::new();
        log.record(&change(ModificationKind::Delete, 10, 8, -3, 1));
        assert_eq!(log.entries(), &[Delete(4), Delete(3), Delete(2), Modify(1)]);
    }

    #[test]
    fn empty_delete_at_origin() {
        let mut log = ChangeLog::new();
        log.record(&change(ModificationKind::Delete, 0, 0, -1, 0));
        assert_eq!(log.drain(), vec![Delete(0)]);
        assert!(log.is_empty());
    }
}
