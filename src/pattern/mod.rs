// ── Pattern entries and the replace list ──────────────────────────────────────
//
// One `PatternEntry` per list row.  Identity is positional; equality is
// structural and is what duplicate detection and re-selection after a sort
// rely on.

use serde::{Deserialize, Serialize};

use crate::{editor::SearchFlags, escape};

pub mod csv;
pub mod export;

// ── PatternEntry ──────────────────────────────────────────────────────────────

/// One find/replace row with its own flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternEntry {
    pub find_text: String,
    pub replace_text: String,
    pub whole_word: bool,
    pub match_case: bool,
    /// Compute the replacement by evaluating `replace_text` as a template.
    pub use_variables: bool,
    /// Decode escape tokens in both texts before use.
    pub extended: bool,
    pub regex: bool,
    /// Whether list operations include this row.
    pub enabled: bool,
}

impl PatternEntry {
    /// An enabled, literal, case-insensitive entry.
    pub fn new(find_text: impl Into<String>, replace_text: impl Into<String>) -> Self {
        Self {
            find_text: find_text.into(),
            replace_text: replace_text.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn whole_word(mut self, on: bool) -> Self {
        self.whole_word = on;
        self
    }

    pub fn match_case(mut self, on: bool) -> Self {
        self.match_case = on;
        self
    }

    pub fn use_variables(mut self, on: bool) -> Self {
        self.use_variables = on;
        self
    }

    pub fn extended(mut self, on: bool) -> Self {
        self.extended = on;
        self
    }

    pub fn regex(mut self, on: bool) -> Self {
        self.regex = on;
        self
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    pub fn search_flags(&self) -> SearchFlags {
        SearchFlags {
            whole_word: self.whole_word,
            match_case: self.match_case,
            regex: self.regex,
        }
    }

    /// The bytes handed to the search capability.
    pub fn find_bytes(&self) -> Vec<u8> {
        escape::decode_if(&self.find_text, self.extended)
    }

    /// The replacement (or template) bytes.
    pub fn replace_bytes(&self) -> Vec<u8> {
        escape::decode_if(&self.replace_text, self.extended)
    }
}

// ── PatternList ───────────────────────────────────────────────────────────────

/// Which text column a sort uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Find,
    Replace,
}

/// Direction for `PatternList::shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Up,
    Down,
}

/// The ordered replace list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternList {
    entries: Vec<PatternEntry>,
}

impl PatternList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<PatternEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PatternEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PatternEntry> {
        self.entries.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled entries in list order.
    pub fn enabled(&self) -> impl Iterator<Item = &PatternEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }

    /// `true` if a structurally equal entry is already present.
    pub fn contains(&self, entry: &PatternEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Append an entry.  Duplicates are allowed; the return value reports
    /// whether `entry` was one so the caller can say so.
    pub fn push(&mut self, entry: PatternEntry) -> bool {
        let duplicate = self.contains(&entry);
        self.entries.push(entry);
        duplicate
    }

    pub fn remove(&mut self, index: usize) -> Option<PatternEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Remove every listed index; returns how many rows were deleted.
    pub fn remove_many(&mut self, indices: &[usize]) -> usize {
        let mut sorted: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.entries.len())
            .collect();
        sorted.sort_unstable();
        sorted.dedup();
        for &i in sorted.iter().rev() {
            self.entries.remove(i);
        }
        sorted.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move the rows at `indices` one step, keeping their relative order.
    ///
    /// Returns the new indices, or `None` when any row would leave the list
    /// (the list is then unchanged).
    pub fn shift(&mut self, indices: &[usize], direction: Shift) -> Option<Vec<usize>> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let (&first, &last) = (sorted.first()?, sorted.last()?);
        if last >= self.entries.len() {
            return None;
        }
        match direction {
            Shift::Up => {
                if first == 0 {
                    return None;
                }
                for index in &mut sorted {
                    self.entries.swap(*index, *index - 1);
                    *index -= 1;
                }
            }
            Shift::Down => {
                if last + 1 == self.entries.len() {
                    return None;
                }
                for index in sorted.iter_mut().rev() {
                    self.entries.swap(*index, *index + 1);
                    *index += 1;
                }
            }
        }
        Some(sorted)
    }

    /// Stable sort by one text column.
    ///
    /// Returns the positions of the previously `selected` rows after the sort,
    /// found again by structural equality.
    pub fn sort_by(&mut self, key: SortKey, ascending: bool, selected: &[usize]) -> Vec<usize> {
        let remembered: Vec<PatternEntry> = selected
            .iter()
            .filter_map(|&i| self.entries.get(i).cloned())
            .collect();

        self.entries.sort_by(|a, b| {
            let (x, y) = match key {
                SortKey::Find => (&a.find_text, &b.find_text),
                SortKey::Replace => (&a.replace_text, &b.replace_text),
            };
            if ascending {
                x.cmp(y)
            } else {
                y.cmp(x)
            }
        });

        let mut taken = vec![false; self.entries.len()];
        let mut reselected = Vec::with_capacity(remembered.len());
        for wanted in &remembered {
            let hit = self
                .entries
                .iter()
                .enumerate()
                .position(|(i, e)| !taken[i] && e == wanted);
            if let Some(i) = hit {
                taken[i] = true;
                reselected.push(i);
            }
        }
        reselected.sort_unstable();
        reselected
    }

    /// Enable or disable the listed rows.
    pub fn set_enabled(&mut self, indices: &[usize], enabled: bool) {
        for &i in indices {
            if let Some(e) = self.entries.get_mut(i) {
                e.enabled = enabled;
            }
        }
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for e in &mut self.entries {
            e.enabled = enabled;
        }
    }

    /// `(any enabled, all enabled)`, used for the list header checkbox.
    pub fn enabled_state(&self) -> (bool, bool) {
        let any = self.entries.iter().any(|e| e.enabled);
        let all = !self.entries.is_empty() && self.entries.iter().all(|e| e.enabled);
        (any, all)
    }
}

impl FromIterator<PatternEntry> for PatternList {
    fn from_iter<I: IntoIterator<Item = PatternEntry>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> PatternList {
        names.iter().map(|n| PatternEntry::new(*n, "")).collect()
    }

    fn finds(l: &PatternList) -> Vec<&str> {
        l.entries().iter().map(|e| e.find_text.as_str()).collect()
    }

    #[test]
    fn push_reports_duplicates_but_keeps_them() {
        let mut l = PatternList::new();
        assert!(!l.push(PatternEntry::new("a", "b")));
        assert!(l.push(PatternEntry::new("a", "b")));
        assert!(!l.push(PatternEntry::new("a", "b").match_case(true)));
        assert_eq!(l.len(), 3);
    }

    #[test]
    fn shift_up_and_down() {
        let mut l = list(&["a", "b", "c", "d"]);
        assert_eq!(l.shift(&[1, 2], Shift::Up), Some(vec![0, 1]));
        assert_eq!(finds(&l), ["b", "c", "a", "d"]);
        assert_eq!(l.shift(&[0], Shift::Up), None);
        assert_eq!(l.shift(&[2], Shift::Down), Some(vec![3]));
        assert_eq!(finds(&l), ["b", "c", "d", "a"]);
        assert_eq!(l.shift(&[3], Shift::Down), None);
    }

    #[test]
    fn remove_many_ignores_out_of_range() {
        let mut l = list(&["a", "b", "c"]);
        assert_eq!(l.remove_many(&[2, 0, 7, 0]), 2);
        assert_eq!(finds(&l), ["b"]);
    }

    #[test]
    fn sort_reselects_moved_rows() {
        let mut l = list(&["pear", "apple", "fig"]);
        let sel = l.sort_by(SortKey::Find, true, &[0]);
        assert_eq!(finds(&l), ["apple", "fig", "pear"]);
        assert_eq!(sel, vec![2]);
        let sel = l.sort_by(SortKey::Find, false, &[0, 1]);
        assert_eq!(finds(&l), ["pear", "fig", "apple"]);
        assert_eq!(sel, vec![1, 2]);
    }

    #[test]
    fn enabled_state_tracks_rows() {
        let mut l = list(&["a", "b"]);
        assert_eq!(l.enabled_state(), (true, true));
        l.set_enabled(&[1], false);
        assert_eq!(l.enabled_state(), (true, false));
        assert_eq!(l.enabled().count(), 1);
        l.set_all_enabled(false);
        assert_eq!(l.enabled_state(), (false, false));
    }

    #[test]
    fn extended_entries_decode_both_texts() {
        let e = PatternEntry::new(r"a\tb", r"\x41").extended(true);
        assert_eq!(e.find_bytes(), b"a\tb");
        assert_eq!(e.replace_bytes(), b"A");
        let raw = PatternEntry::new(r"a\tb", "");
        assert_eq!(raw.find_bytes(), br"a\tb");
    }
}
