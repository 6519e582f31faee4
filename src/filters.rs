//! User-configured content filters.
//!
//! A filter file is a JSON document with four optional sections: pages to
//! skip entirely, CSS classes and element ids whose elements are elided
//! from the rendered output, and regex text replacements applied to the
//! serialized article after rendering. The configuration is loaded once at
//! startup, compiled, and shared read-only across all workers.

use anyhow::{Context, Result};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Classes always elided regardless of configuration: navigation boxes,
/// collapsible wrappers and nav bars carry no dictionary content.
pub const BUILTIN_EXCLUDE_CLASSES: &[&str] = &[
    "navbox",
    "collapsible",
    "autocollapse",
    "plainlinksneverexpand",
    "navbar",
];

#[derive(Debug, Deserialize)]
struct ReplacementSpec {
    re: String,
    #[serde(default)]
    sub: String,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSpec {
    #[serde(default)]
    exclude_pages: Vec<String>,
    #[serde(default)]
    exclude_classes: Vec<String>,
    #[serde(default)]
    exclude_ids: Vec<String>,
    #[serde(default)]
    text_replace: Vec<ReplacementSpec>,
}

#[derive(Debug)]
pub struct TextReplacement {
    pub pattern: Regex,
    pub replacement: String,
}

#[derive(Debug, Default)]
pub struct FilterConfig {
    excluded_pages: FxHashSet<String>,
    excluded_classes: FxHashSet<String>,
    excluded_ids: FxHashSet<String>,
    replacements: Vec<TextReplacement>,
}

impl FilterConfig {
    /// Loads and compiles a filter file. Missing file or a bad regex is
    /// fatal before any article is processed.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Filter file not found: {}", path.display()))?;
        let spec: FilterSpec = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse filter file: {}", path.display()))?;
        let config = Self::from_spec(spec)?;

        info!(
            excluded_pages = config.excluded_pages.len(),
            excluded_classes = config.excluded_classes.len(),
            excluded_ids = config.excluded_ids.len(),
            replacements = config.replacements.len(),
            "Filters loaded"
        );

        Ok(config)
    }

    fn from_spec(spec: FilterSpec) -> Result<Self> {
        let mut replacements = Vec::with_capacity(spec.text_replace.len());
        for item in spec.text_replace {
            let pattern = Regex::new(&item.re)
                .with_context(|| format!("Invalid text replacement pattern: {}", item.re))?;
            replacements.push(TextReplacement {
                pattern,
                replacement: item.sub,
            });
        }

        Ok(FilterConfig {
            excluded_pages: spec.exclude_pages.into_iter().collect(),
            excluded_classes: spec.exclude_classes.into_iter().collect(),
            excluded_ids: spec.exclude_ids.into_iter().collect(),
            replacements,
        })
    }

    pub fn is_page_excluded(&self, title: &str) -> bool {
        self.excluded_pages.contains(title)
    }

    /// True when any of the element's classes is in the built-in exclusion
    /// set or the configured one.
    pub fn is_class_excluded<'a>(&self, mut classes: impl Iterator<Item = &'a str>) -> bool {
        classes.any(|class| {
            BUILTIN_EXCLUDE_CLASSES.contains(&class) || self.excluded_classes.contains(class)
        })
    }

    pub fn is_id_excluded(&self, id: &str) -> bool {
        self.excluded_ids.contains(id)
    }

    /// Applies every configured replacement, in file order, globally.
    pub fn apply_replacements(&self, mut text: String) -> String {
        for replace in &self.replacements {
            if replace.pattern.is_match(&text) {
                text = replace
                    .pattern
                    .replace_all(&text, replace.replacement.as_str())
                    .into_owned();
            }
        }
        text
    }

    #[cfg(test)]
    pub fn for_tests(classes: &[&str], ids: &[&str], pages: &[&str]) -> Self {
        FilterConfig {
            excluded_pages: pages.iter().map(|s| s.to_string()).collect(),
            excluded_classes: classes.iter().map(|s| s.to_string()).collect(),
            excluded_ids: ids.iter().map(|s| s.to_string()).collect(),
            replacements: Vec::new(),
        }
    }
}
