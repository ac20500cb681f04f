// ── Pattern list files ────────────────────────────────────────────────────────
//
// Comma-separated records, one per list row, after a single header line:
//
//   Selected,Find,Replace,WholeWord,MatchCase,UseVariables,Extended,Regex
//
// Flags are written as `0`/`1`; any integer reads back, non-zero meaning set.
// Text fields are quote-wrapped when they contain a comma, a quote or a line
// break, with literal quotes doubled.  A malformed record fails the whole
// file; a partially loaded list is never returned.

use std::{fs, path::Path};

use tracing::debug;

use super::{PatternEntry, PatternList};
use crate::error::{CsvError, Error, Result};

pub const HEADER: &str = "Selected,Find,Replace,WholeWord,MatchCase,UseVariables,Extended,Regex";

const FIELD_COUNT: usize = 8;

// ── Writing ───────────────────────────────────────────────────────────────────

/// Quote `value` if it needs it.
pub fn escape_field(value: &str) -> String {
    if !value.contains([',', '"', '\r', '\n']) {
        return value.to_owned();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Serialize the whole list, header included.
pub fn to_string(list: &PatternList) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for e in list.entries() {
        let fields = [
            flag(e.enabled).to_owned(),
            escape_field(&e.find_text),
            escape_field(&e.replace_text),
            flag(e.whole_word).to_owned(),
            flag(e.match_case).to_owned(),
            flag(e.use_variables).to_owned(),
            flag(e.extended).to_owned(),
            flag(e.regex).to_owned(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Write `list` to `path`, replacing any existing file.
pub fn save(path: &Path, list: &PatternList) -> Result<()> {
    fs::write(path, to_string(list)).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), entries = list.len(), "pattern list saved");
    Ok(())
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Split `content` into records of fields.
///
/// Quotes only have meaning at the start of a field; inside a quoted field
/// `""` is a literal quote and line breaks are part of the value.  Blank
/// lines between records are skipped.
fn records(content: &str, file: &str) -> std::result::Result<Vec<Vec<String>>, CsvError> {
    let mut out = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut field_started = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if quoted {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }
        match ch {
            '"' if !field_started => {
                quoted = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if field_started || !record.is_empty() {
                    record.push(std::mem::take(&mut field));
                    out.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            _ => {
                field.push(ch);
                field_started = true;
            }
        }
    }

    if quoted {
        return Err(CsvError::UnterminatedQuote { file: file.to_owned() });
    }
    if field_started || !record.is_empty() {
        record.push(field);
        out.push(record);
    }
    Ok(out)
}

fn parse_flag(text: &str, file: &str, record: usize) -> std::result::Result<bool, CsvError> {
    text.trim()
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| CsvError::InvalidFlag { file: file.to_owned(), record })
}

/// Parse list content; `file` only names the source in error messages.
pub fn from_str(content: &str, file: &str) -> Result<PatternList> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rows = records(content, file)?;
    let mut list = PatternList::new();

    // Record numbers in errors are 1-based and exclude the header.
    for (i, row) in rows.into_iter().skip(1).enumerate() {
        let record = i + 1;
        if row.len() != FIELD_COUNT {
            return Err(CsvError::ColumnCount { file: file.to_owned(), record }.into());
        }
        let mut it = row.into_iter();
        let mut next = || it.next().unwrap_or_default();
        let enabled = parse_flag(&next(), file, record)?;
        let find_text = next();
        let replace_text = next();
        let entry = PatternEntry {
            enabled,
            find_text,
            replace_text,
            whole_word: parse_flag(&next(), file, record)?,
            match_case: parse_flag(&next(), file, record)?,
            use_variables: parse_flag(&next(), file, record)?,
            extended: parse_flag(&next(), file, record)?,
            regex: parse_flag(&next(), file, record)?,
        };
        list.push(entry);
    }
    Ok(list)
}

/// Load a list file.  The file name (not the full path) is used in errors,
/// as shown in the status line.
pub fn load(path: &Path) -> Result<PatternList> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let content = String::from_utf8_lossy(&bytes);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let list = from_str(&content, &name)?;
    debug!(path = %path.display(), entries = list.len(), "pattern list loaded");
    Ok(list)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
