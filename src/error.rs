// ── Central error type ────────────────────────────────────────────────────────
//
// All fallible operations in the engine return `error::Result<T>`.  Nothing
// here is fatal to the host: user-input errors become status messages,
// script errors become (suppressible) dialogs, and the worst outcome of any
// failure is "no replacement performed".

use std::path::PathBuf;

use thiserror::Error;

/// Every error the engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected user input; the operation aborted without side effects.
    #[error(transparent)]
    Input(#[from] UserInputError),

    /// A scripted replacement failed.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A pattern list could not be loaded.
    #[error(transparent)]
    Csv(#[from] CsvError),

    /// The regex capability rejected a pattern.
    #[error("Invalid regular expression: {0}")]
    InvalidPattern(String),

    /// A standard I/O error (list import/export, settings file).
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error together with the file it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

// ── User input ────────────────────────────────────────────────────────────────

/// Problems with what the user typed or configured.
///
/// The display strings are the status-bar texts shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserInputError {
    #[error("No 'Find String' entered. Please provide a value.")]
    EmptyPattern,
    #[error("Add values into the list. Or uncheck 'Use in List'.")]
    EmptyList,
    #[error("Cannot replace. Document is read-only.")]
    ReadOnly,
    #[error("Column data or delimiter data is missing")]
    MissingColumnData,
    #[error("Invalid range in column data")]
    InvalidColumnRange,
    #[error("Invalid column number")]
    InvalidColumnNumber,
    #[error("Syntax error in column data")]
    ColumnSyntax,
    #[error("Extended delimiter is empty")]
    EmptyDelimiter,
    #[error("Invalid quote character. Use \", ' or leave it empty.")]
    InvalidQuoteChar,
    #[error("Column mode is active but no valid column data is set")]
    ColumnScopeUnset,
}

// ── Scripted replacement ─────────────────────────────────────────────────────

/// Failure while evaluating a replacement template.
///
/// `Syntax` aborts a whole batch because it recurs on every match; the other
/// variants only abandon the current match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("Use Variables: Syntax Error in '{template}': {message}")]
    Syntax { template: String, message: String },
    #[error("Use Variables: Execution Error in '{template}': {message}")]
    Runtime { template: String, message: String },
    #[error("Execution halted due to execution failure in:\n{template}")]
    NoResult { template: String },
}

impl ScriptError {
    /// The template text that failed.
    pub fn template(&self) -> &str {
        match self {
            Self::Syntax { template, .. }
            | Self::Runtime { template, .. }
            | Self::NoResult { template } => template,
        }
    }

    /// `true` when retrying on the next match cannot succeed either.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

// ── List import ───────────────────────────────────────────────────────────────

/// A pattern list file that could not be loaded.  Always whole-file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    #[error("Invalid number of columns in CSV file '{file}' (record {record}).")]
    ColumnCount { file: String, record: usize },
    #[error("Invalid data in columns of '{file}' (record {record}).")]
    InvalidFlag { file: String, record: usize },
    #[error("Unterminated quoted field in '{file}'.")]
    UnterminatedQuote { file: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_message_matches_status_text() {
        let e: Error = UserInputError::ReadOnly.into();
        assert_eq!(e.to_string(), "Cannot replace. Document is read-only.");
    }

    #[test]
    fn only_syntax_errors_abort_batches() {
        let syntax = ScriptError::Syntax { template: "x(".into(), message: "eof".into() };
        let runtime = ScriptError::Runtime { template: "x()".into(), message: "nil".into() };
        let none = ScriptError::NoResult { template: "1".into() };
        assert!(syntax.is_fatal_for_batch());
        assert!(!runtime.is_fatal_for_batch());
        assert!(!none.is_fatal_for_batch());
        assert_eq!(none.template(), "1");
    }

    #[test]
    fn io_error_names_the_file() {
        let e = Error::io("list.csv", std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(e.to_string().contains("list.csv"));
    }
}
