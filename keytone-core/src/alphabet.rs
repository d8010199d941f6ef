//! Canonical Morse alphabet and the shortcut-sequence override table.
//!
//! Sequences are keyed by their glyph rendering (`·` and `−`), the same
//! representation the external shortcuts collaborator supplies and persists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{KeytoneError, Result};

/// Dot glyph used in sequence keys.
pub const DOT_GLYPH: char = '·';
/// Dash glyph used in sequence keys.
pub const DASH_GLYPH: char = '−';
/// Emitted when a committed sequence matches neither table.
pub const UNKNOWN_MARKER: &str = "?";

/// One Morse signal symbol, classified by active-signal duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    pub fn glyph(self) -> char {
        match self {
            Symbol::Dot => DOT_GLYPH,
            Symbol::Dash => DASH_GLYPH,
        }
    }
}

/// Render a symbol buffer as a table key.
pub fn sequence_key(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.glyph()).collect()
}

/// Reject keys containing anything but the two sequence glyphs.
pub fn validate_sequence(key: &str) -> Result<()> {
    if key.is_empty() || key.chars().any(|c| c != DOT_GLYPH && c != DASH_GLYPH) {
        return Err(KeytoneError::InvalidSequence(key.to_string()));
    }
    Ok(())
}

/// A–Z and 0–9. Keys are unique and no two characters share a sequence.
const STANDARD: &[(&str, char)] = &[
    ("·−", 'A'),
    ("−···", 'B'),
    ("−·−·", 'C'),
    ("−··", 'D'),
    ("·", 'E'),
    ("··−·", 'F'),
    ("−−·", 'G'),
    ("····", 'H'),
    ("··", 'I'),
    ("·−−−", 'J'),
    ("−·−", 'K'),
    ("·−··", 'L'),
    ("−−", 'M'),
    ("−·", 'N'),
    ("−−−", 'O'),
    ("·−−·", 'P'),
    ("−−·−", 'Q'),
    ("·−·", 'R'),
    ("···", 'S'),
    ("−", 'T'),
    ("··−", 'U'),
    ("···−", 'V'),
    ("·−−", 'W'),
    ("−··−", 'X'),
    ("−·−−", 'Y'),
    ("−−··", 'Z'),
    ("·−−−−", '1'),
    ("··−−−", '2'),
    ("···−−", '3'),
    ("····−", '4'),
    ("·····", '5'),
    ("−····", '6'),
    ("−−···", '7'),
    ("−−−··", '8'),
    ("−−−−·", '9'),
    ("−−−−−", '0'),
];

/// Shortcut sequences shipped by default; replaceable at runtime.
const SHORTCUTS: &[(&str, &str)] = &[
    ("−·−·−−", "Fantastic"),
    ("·−·−·−", "Excellent"),
    ("−−··−−", "Good job"),
    ("···−−−···", "SOS"),
    ("−·−−·−", "Start of message"),
    ("·−·−·", "End of message"),
];

/// The fixed single-character Morse map (A–Z, 0–9).
pub fn standard_table() -> HashMap<String, char> {
    STANDARD
        .iter()
        .map(|(seq, ch)| (seq.to_string(), *ch))
        .collect()
}

/// The default multi-symbol → word overrides.
pub fn default_shortcuts() -> HashMap<String, String> {
    SHORTCUTS
        .iter()
        .map(|(seq, word)| (seq.to_string(), word.to_string()))
        .collect()
}

/// Resolution outcome for a committed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub is_shortcut: bool,
}

/// Both lookup tables, checked in priority order (shortcuts win).
#[derive(Debug, Clone)]
pub struct SymbolTables {
    morse: HashMap<String, char>,
    shortcuts: HashMap<String, String>,
}

impl Default for SymbolTables {
    fn default() -> Self {
        Self {
            morse: standard_table(),
            shortcuts: default_shortcuts(),
        }
    }
}

impl SymbolTables {
    pub fn new(morse: HashMap<String, char>, shortcuts: HashMap<String, String>) -> Result<Self> {
        let mut tables = Self {
            morse: HashMap::new(),
            shortcuts: HashMap::new(),
        };
        tables.set_morse(morse)?;
        tables.set_shortcuts(shortcuts)?;
        Ok(tables)
    }

    /// Replace the shortcut table. Every key must be a valid glyph sequence.
    pub fn set_shortcuts(&mut self, shortcuts: HashMap<String, String>) -> Result<()> {
        for key in shortcuts.keys() {
            validate_sequence(key)?;
        }
        self.shortcuts = shortcuts;
        Ok(())
    }

    /// Replace the single-character table (pluggable for alternate alphabets).
    pub fn set_morse(&mut self, morse: HashMap<String, char>) -> Result<()> {
        for key in morse.keys() {
            validate_sequence(key)?;
        }
        self.morse = morse;
        Ok(())
    }

    /// Shortcut table first, then the Morse table, then the unknown marker.
    pub fn resolve(&self, symbols: &[Symbol]) -> Resolution {
        let key = sequence_key(symbols);
        if let Some(word) = self.shortcuts.get(&key) {
            return Resolution {
                text: word.clone(),
                is_shortcut: true,
            };
        }
        let text = self
            .morse
            .get(&key)
            .map(|c| c.to_string())
            .unwrap_or_else(|| UNKNOWN_MARKER.to_string());
        Resolution {
            text,
            is_shortcut: false,
        }
    }
}
