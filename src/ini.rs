//! Minimal model of the `.mxproject` INI dialect.
//!
//! The vendor packs semicolon-separated file lists into a single key:
//!
//! ```text
//! [PreviousUsedKeilFiles]
//! SourceFiles=..\Src\main.c;..\Src\stm32f4xx_it.c;..\Src\gpio.c
//! ```
//!
//! Classic INI readers treat `;` as the comment introducer, which makes
//! everything after the first list entry the key's *trailing comment*.
//! The manifest reader depends on exactly that split, so the document
//! model keeps both halves per key.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A single `key=value` entry, comment half included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    /// Everything after the first `;` on the line, without the `;`.
    pub comment: String,
}

/// Parsed INI document, sections and keys in file order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    sections: IndexMap<String, IndexMap<String, Entry>>,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut doc = Document::default();
        let mut current = String::new();
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                doc.sections.entry(current.clone()).or_default();
                continue;
            }
            let Some((key, rest)) = line.split_once('=') else {
                continue;
            };
            let (value, comment) = match rest.split_once(';') {
                Some((v, c)) => (v.trim(), c.trim()),
                None => (rest.trim(), ""),
            };
            doc.sections.entry(current.clone()).or_default().insert(
                key.trim().to_string(),
                Entry {
                    value: value.to_string(),
                    comment: comment.to_string(),
                },
            );
        }
        doc
    }

    pub fn section(&self, name: &str) -> Option<&IndexMap<String, Entry>> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Scalar value of `section.key`, empty string when absent.
    pub fn value(&self, section: &str, key: &str) -> &str {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|e| e.value.as_str())
            .unwrap_or("")
    }

    /// Value plus trailing-comment tokens of `section.key`, split on `;`.
    pub fn csv(&self, section: &str, key: &str) -> Vec<&str> {
        let Some(entry) = self.sections.get(section).and_then(|s| s.get(key)) else {
            return Vec::new();
        };
        let mut items = vec![entry.value.as_str()];
        if !entry.comment.is_empty() {
            items.extend(entry.comment.split(';'));
        }
        items
    }
}
