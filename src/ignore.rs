//! Pages excluded before classification.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Case-insensitive substring filters read from `{ "titles": [...], "keywords": [...] }`.
///
/// Title patterns are tested against the page title. Keywords are tested against the
/// title and the raw page text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgnoreList {
    #[serde(default)]
    titles: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

impl IgnoreList {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ignore list: {}", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("Failed to parse ignore list: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let list: Self = serde_json::from_str(json)?;
        Ok(Self {
            titles: normalize(list.titles),
            keywords: normalize(list.keywords),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.keywords.is_empty()
    }

    pub fn should_skip(&self, title: &str, text: &str) -> bool {
        if self.is_empty() || title.trim().is_empty() {
            return false;
        }
        let title = title.to_lowercase();
        if self
            .titles
            .iter()
            .chain(&self.keywords)
            .any(|pattern| title.contains(pattern.as_str()))
        {
            return true;
        }
        if self.keywords.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

fn normalize(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn titles_match_as_substrings() {
        let list = IgnoreList::from_json(r#"{"titles": ["Version", "  "]}"#).unwrap();
        assert!(list.should_skip("Version 1.0", "text"));
        assert!(list.should_skip("Game version history", "text"));
        assert!(!list.should_skip("Amber", "Version 1.0 character"));
    }

    #[test]
    fn keywords_match_title_or_text() {
        let list = IgnoreList::from_json(r#"{"keywords": ["{{Stub"]}"#).unwrap();
        assert!(list.should_skip("Amber", "{{stub}} short page"));
        assert!(!list.should_skip("Amber", "full page"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let list = IgnoreList::from_json("{}").unwrap();
        assert!(list.is_empty());
        assert!(!list.should_skip("Anything", "at all"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"titles": ["Event"], "keywords": []}}"#).unwrap();
        let list = IgnoreList::load(file.path()).unwrap();
        assert!(list.should_skip("Event Wish", ""));
    }

    #[test]
    fn malformed_file_names_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = IgnoreList::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse ignore list"));
    }
}
