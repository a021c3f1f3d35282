//! Parser for the STM32CubeMX `.ioc` project file.
//!
//! The format is a flat list of `Section.Key=Value` lines with no
//! section-header syntax. Malformed lines (no `=`, or no `.` in the
//! key) are silently dropped; later occurrences of the same
//! `Section.Key` overwrite earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Two-level section → key → value map of an `.ioc` file.
#[derive(Debug, Clone, Default)]
pub struct Ioc {
    /// Where the map was loaded from; empty for in-memory parses.
    origin: PathBuf,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl Ioc {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut ioc = Self::parse(&text);
        ioc.origin = path.to_path_buf();
        Ok(ioc)
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn parse(text: &str) -> Self {
        let mut ioc = Ioc::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let Some((section, name)) = key.split_once('.') else {
                continue;
            };
            ioc.sections
                .entry(section.to_string())
                .or_default()
                .insert(name.to_string(), value.to_string());
        }
        ioc
    }

    pub fn section(&self, name: &str) -> Option<&IndexMap<String, String>> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
