// ── Settings persistence ──────────────────────────────────────────────────────
//
// Reads and writes `<config dir>/MultiReplace/settings.json` and keeps the
// replace list next to it as `list.csv`.
// No `unsafe` here, only serde_json and std::fs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    editor::TextBuffer,
    engine::{Engine, SearchOptions},
    error::{Error, Result},
    pattern::{csv, PatternEntry, PatternList},
};

// ── Format version ────────────────────────────────────────────────────────────

const SETTINGS_VERSION: u32 = 1;

/// Entries kept in each input history.
pub const HISTORY_LEN: usize = 10;

// ── On-disk types ─────────────────────────────────────────────────────────────

/// Root of the JSON settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    /// Texts and flags of the find/replace input fields.
    pub input: PatternEntry,
    pub options: SearchOptions,
    pub columns: ColumnSettings,
    pub find_history: History,
    pub replace_history: History,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            input: PatternEntry::new("", ""),
            options: SearchOptions::default(),
            columns: ColumnSettings::default(),
            find_history: History::default(),
            replace_history: History::default(),
        }
    }
}

/// The column-mode input fields, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub columns: String,
    pub delimiter: String,
    pub quote: String,
}

impl ColumnSettings {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.delimiter.is_empty()
    }
}

/// Most recent first, no duplicates, at most `HISTORY_LEN` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<String>);

impl History {
    /// Move `text` to the front.  Empty strings are ignored.
    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.0.retain(|t| t != text);
        self.0.insert(0, text.to_owned());
        self.0.truncate(HISTORY_LEN);
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

impl Settings {
    /// Remember what the user just ran.
    pub fn record_input(&mut self, input: &PatternEntry) {
        self.find_history.push(&input.find_text);
        self.replace_history.push(&input.replace_text);
    }

    /// Copy the engine's current input fields and options.
    pub fn update_from<B: TextBuffer>(&mut self, engine: &Engine<B>) {
        self.input = engine.input().clone();
        self.options = engine.options().clone();
    }

    /// Restore input fields, options and column scope into `engine`.
    pub fn apply_to<B: TextBuffer>(&self, engine: &mut Engine<B>) -> Result<()> {
        *engine.input_mut() = self.input.clone();
        *engine.options_mut() = self.options.clone();
        if !self.columns.is_empty() {
            let c = &self.columns;
            engine.set_column_scope(&c.columns, &c.delimiter, &c.quote)?;
        }
        Ok(())
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// `<config dir>/MultiReplace`, or `None` when the platform has no config
/// directory.
pub fn settings_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("MultiReplace"))
}

pub fn settings_path() -> Option<PathBuf> {
    Some(settings_dir()?.join("settings.json"))
}

pub fn list_path() -> Option<PathBuf> {
    Some(settings_dir()?.join("list.csv"))
}

// ── Save ──────────────────────────────────────────────────────────────────────

/// Write `settings` to `path`, creating the parent directory.
pub fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    serde_json::to_writer_pretty(file, settings)
        .map_err(|e| Error::io(path, std::io::Error::other(e)))?;
    debug!(path = %path.display(), "settings saved");
    Ok(())
}

/// Save settings and the replace list to their default locations.
pub fn save(settings: &Settings, list: &PatternList) -> Result<()> {
    let (Some(settings_file), Some(list_file)) = (settings_path(), list_path()) else {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory");
        return Err(Error::io("MultiReplace", missing));
    };
    save_to(&settings_file, settings)?;
    csv::save(&list_file, list)
}

// ── Load ──────────────────────────────────────────────────────────────────────

/// Read and parse a settings file.
///
/// Returns `None` on any error: file missing, JSON parse failure, or an
/// unrecognised version number.  Callers continue with defaults.
pub fn load_from(path: &Path) -> Option<Settings> {
    let data = fs::read(path).ok()?;
    let settings: Settings = serde_json::from_slice(&data).ok()?;
    if settings.version != SETTINGS_VERSION {
        debug!(version = settings.version, "ignoring settings with unknown version");
        return None;
    }
    Some(settings)
}

/// Settings and list from their default locations; defaults for whatever
/// cannot be read.
pub fn load() -> (Settings, PatternList) {
    let settings = settings_path().and_then(|p| load_from(&p)).unwrap_or_default();
    let list = list_path()
        .and_then(|p| csv::load(&p).ok())
        .unwrap_or_default();
    (settings, list)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{editor::memory::MemoryBuffer, search::scope::ScopeMode};

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.input = PatternEntry::new("foo", "bar").regex(true);
        settings.options.scope = ScopeMode::Columns;
        settings.columns = ColumnSettings { columns: "1-3".into(), delimiter: ",".into(), quote: "\"".into() };
        settings.record_input(&settings.input.clone());

        save_to(&path, &settings).expect("save");
        let loaded = load_from(&path).expect("load");
        assert_eq!(loaded, settings);
        assert_eq!(loaded.find_history.entries(), ["foo"]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let json = r#"{"version":1,"input":{"find_text":"x"}}"#;
        let s: Settings = serde_json::from_str(json).expect("deserialize old format");
        assert_eq!(s.input.find_text, "x");
        assert!(s.options.wrap_around);
        assert_eq!(s.options.scope, ScopeMode::Document);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"version":99}"#).expect("write");
        assert!(load_from(&path).is_none());
        assert!(load_from(&dir.path().join("absent.json")).is_none());
    }

    #[test]
    fn history_is_bounded_and_deduplicated() {
        let mut h = History::default();
        for i in 0..15 {
            h.push(&format!("t{i}"));
        }
        h.push("");
        h.push("t10");
        assert_eq!(h.entries().len(), HISTORY_LEN);
        assert_eq!(h.entries()[0], "t10");
        assert_eq!(h.entries()[1], "t14");
        assert_eq!(h.entries().iter().filter(|t| *t == "t10").count(), 1);
    }

    #[test]
    fn applies_to_engine() {
        let mut settings = Settings::default();
        settings.input = PatternEntry::new("a", "b");
        settings.options.use_list = true;
        settings.columns = ColumnSettings { columns: "2".into(), delimiter: ";".into(), quote: String::new() };

        let mut engine = Engine::new(MemoryBuffer::new("x;a"));
        settings.apply_to(&mut engine).expect("apply");
        assert_eq!(engine.input().find_text, "a");
        assert!(engine.options().use_list);
        assert!(engine.column_scope().is_some());

        let mut back = Settings::default();
        back.update_from(&engine);
        assert_eq!(back.input, settings.input);
    }
}
