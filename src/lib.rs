// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except:
//   • `platform::win32`   – message boxes for the plugin host
//   • `editor::scintilla` – the Scintilla buffer adapter
// Each unsafe block in those modules MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]

//! Multi-pattern find, replace and mark engine for Scintilla-based editors.
//!
//! The engine works against the [`editor::TextBuffer`] trait.  Hosts wrap
//! their editor control (see `editor::scintilla` on Windows); everything else
//! uses [`editor::memory::MemoryBuffer`].
//!
//! ```
//! use multireplace::{editor::memory::MemoryBuffer, engine::Engine, pattern::PatternEntry};
//!
//! let mut engine = Engine::new(MemoryBuffer::new("cat catalog CAT"));
//! *engine.input_mut() = PatternEntry::new("cat", "dog").whole_word(true);
//! let outcome = engine.replace_all().unwrap();
//! assert_eq!(outcome.replaced, 2);
//! assert_eq!(engine.buffer().text(), b"dog catalog dog");
//! ```

pub mod columns;
pub mod editor;
pub mod engine;
pub mod error;
pub mod escape;
pub mod mark;
pub mod pattern;
pub mod report;
pub mod script;
pub mod search;
pub mod settings;

#[cfg(windows)]
pub mod platform;

pub use error::{Error, Result};
