//! Editor document collaborator.
//!
//! Agents see the editor's documents only through [`Document`]: current
//! text, cursor, a replace-range edit and a stable URL used as cache key.
//! Offsets and positions count characters, not bytes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;

// ============================================================================
// Position
// ============================================================================

/// Zero-based line/column position, columns in characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Character column.
    pub ch: usize,
}

impl Position {
    #[inline]
    #[must_use]
    pub const fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.ch)
    }
}

// ============================================================================
// Document
// ============================================================================

/// An open editor document.
pub trait Document: Send + Sync {
    /// Stable URL of the document; agents key their caches by it.
    fn url(&self) -> String;

    /// Current full text.
    fn text(&self) -> String;

    /// Current cursor position.
    fn cursor(&self) -> Position;

    /// Replaces the text between `from` and `to` with `text`.
    fn replace_range(&self, text: &str, from: Position, to: Position);

    /// Converts a character offset to a position. Offsets past the end clamp
    /// to the end.
    fn pos_from_index(&self, index: usize) -> Position {
        pos_from_index(&self.text(), index)
    }

    /// Converts a position to a character offset. Columns past the end of a
    /// line clamp to the line end.
    fn index_from_pos(&self, pos: Position) -> usize {
        index_from_pos(&self.text(), pos)
    }
}

/// Character offset to position in `text`.
#[must_use]
pub fn pos_from_index(text: &str, index: usize) -> Position {
    let mut pos = Position::default();
    for c in text.chars().take(index) {
        if c == '\n' {
            pos.line += 1;
            pos.ch = 0;
        } else {
            pos.ch += 1;
        }
    }
    pos
}

/// Position to character offset in `text`.
#[must_use]
pub fn index_from_pos(text: &str, pos: Position) -> usize {
    let mut index = 0;
    for (line_number, line) in text.split('\n').enumerate() {
        let len = line.chars().count();
        if line_number == pos.line {
            return index + pos.ch.min(len);
        }
        index += len + 1;
    }
    text.chars().count()
}

/// Byte offset of character offset `index` in `text`.
#[must_use]
pub(crate) fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

// ============================================================================
// TextDocument
// ============================================================================

/// In-memory [`Document`].
#[derive(Debug)]
pub struct TextDocument {
    url: String,
    text: Mutex<String>,
    cursor: Mutex<Position>,
}

impl TextDocument {
    /// Creates a document.
    #[must_use]
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: Mutex::new(text.into()),
            cursor: Mutex::new(Position::default()),
        }
    }

    /// Replaces the whole text.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock() = text.into();
    }

    /// Moves the cursor.
    pub fn set_cursor(&self, pos: Position) {
        *self.cursor.lock() = pos;
    }
}

impl Document for TextDocument {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn text(&self) -> String {
        self.text.lock().clone()
    }

    fn cursor(&self) -> Position {
        *self.cursor.lock()
    }

    fn replace_range(&self, text: &str, from: Position, to: Position) {
        let mut current = self.text.lock();
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let start = byte_offset(&current, index_from_pos(&current, from));
        let end = byte_offset(&current, index_from_pos(&current, to));
        current.replace_range(start..end, text);
    }
}

// ============================================================================
// Tests
// ============================================================================
