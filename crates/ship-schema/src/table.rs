//! Line-oriented section format shared by the manifest, the checkpoint,
//! server package indices and `packageinfo` files.
//!
//! ```text
//! # comment
//! [Servers]
//! official = "https://pkg.example.org"
//!
//! [Package.foo]
//! Version = '2'
//! ```
//!
//! Whitespace outside quotes is dropped, quote characters are stripped and
//! protect the whitespace between a matching pair, and `#` outside quotes
//! starts a comment. Quoted `=`, `[` and `]` are literal. Serializing always
//! quotes values, quotes keys and section names only when they need it, and
//! separates sections with a blank line.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Name given to the section that collects assignments appearing before the
/// first header.
pub const DEFAULT_SECTION: &str = "default";

/// Errors produced while parsing section text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A non-blank line that is neither a section header nor an assignment.
    #[error("line {line}: expected '[Section]' or 'key = value', got '{text}'")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The offending line as written.
        text: String,
    },

    /// A `[]` header.
    #[error("line {line}: empty section name")]
    EmptySectionName {
        /// One-based line number.
        line: usize,
    },

    /// An assignment with nothing before the `=`.
    #[error("line {line}: empty key")]
    EmptyKey {
        /// One-based line number.
        line: usize,
    },
}

/// A named, ordered list of `key = value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Create an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// The section name as written between the brackets.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a value, treating an empty string the same as a missing key.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Set a value. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate over the pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section has no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered collection of sections.
///
/// Sections are kept in the order they were parsed or pushed. Parsing keeps
/// repeated headers as separate sections so that higher layers can reject
/// duplicates instead of silently merging them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    sections: Vec<Section>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse section text.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] naming the first line that is neither blank,
    /// a comment, a section header, nor a `key = value` assignment.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut table = Table::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let scrubbed = scrub(raw);
            if scrubbed.is_empty() {
                continue;
            }

            if let [('[', false), inner @ .., (']', false)] = scrubbed.as_slice() {
                if inner.is_empty() {
                    return Err(TableError::EmptySectionName { line });
                }
                table.sections.push(Section::new(collect(inner)));
                current = Some(table.sections.len() - 1);
                continue;
            }

            let Some(eq) = scrubbed.iter().position(|&(c, quoted)| c == '=' && !quoted) else {
                return Err(TableError::Malformed {
                    line,
                    text: raw.trim().to_string(),
                });
            };
            if eq == 0 {
                return Err(TableError::EmptyKey { line });
            }
            let key = collect(&scrubbed[..eq]);
            let value = collect(&scrubbed[eq + 1..]);

            let slot = match current {
                Some(slot) => slot,
                None => {
                    table.sections.push(Section::new(DEFAULT_SECTION));
                    let slot = table.sections.len() - 1;
                    current = Some(slot);
                    slot
                }
            };
            table.sections[slot].set(key, value);
        }

        Ok(table)
    }

    /// First section with the given name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Mutable access to the first section with the given name.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Append a section. Callers decide whether duplicates are acceptable.
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Remove the first section with the given name.
    pub fn remove(&mut self, name: &str) -> Option<Section> {
        let pos = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(pos))
    }

    /// Iterate over the sections in order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the table has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl IntoIterator for Table {
    type Item = Section;
    type IntoIter = std::vec::IntoIter<Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.into_iter()
    }
}

impl FromIterator<Section> for Table {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", quote_if_needed(&section.name))?;
            for (key, value) in &section.entries {
                writeln!(f, "{} = {}", quote_if_needed(key), quote(value))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Drop comments, unquoted whitespace, and the quote characters themselves.
/// Each kept character carries whether it was inside quotes, so quoted `=`,
/// `[` and `]` stay literal.
fn scrub(line: &str) -> Vec<(char, bool)> {
    let mut out = Vec::with_capacity(line.len());
    let mut open: Option<char> = None;

    for c in line.chars() {
        match open {
            Some(q) if c == q => open = None,
            Some(_) => out.push((c, true)),
            None => match c {
                '"' | '\'' => open = Some(c),
                '#' => break,
                ' ' | '\t' | '\r' => {}
                _ => out.push((c, false)),
            },
        }
    }

    out
}

fn collect(chars: &[(char, bool)]) -> String {
    chars.iter().map(|&(c, _)| c).collect()
}

/// Quote a value so it parses back unchanged.
///
/// A value holding only one kind of quote is wrapped in the other kind. A
/// value holding both is written as adjacent quoted runs, switching quote
/// character whenever the current one appears: `it's "b"` becomes
/// `"it's "'"b"'`.
fn quote(value: &str) -> String {
    let first_double = value
        .find(['"', '\''])
        .is_some_and(|i| value[i..].starts_with('"'));
    let mut q = if first_double { '\'' } else { '"' };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(q);
    for c in value.chars() {
        if c == q {
            out.push(q);
            q = if q == '"' { '\'' } else { '"' };
            out.push(q);
        }
        out.push(c);
    }
    out.push(q);
    out
}

/// Keys and section names are written bare unless they hold a character the
/// parser would drop or treat as syntax.
fn quote_if_needed(text: &str) -> Cow<'_, str> {
    let special = |c: char| c.is_whitespace() || matches!(c, '#' | '=' | '"' | '\'' | '[' | ']');
    if text.contains(special) {
        Cow::Owned(quote(text))
    } else {
        Cow::Borrowed(text)
    }
}
