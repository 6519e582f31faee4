//! Site description loading.
//!
//! A site-info file is the JSON description of the source wiki (general
//! attributes, namespaces, magic words). It is loaded once at startup and
//! treated as immutable for the whole run; a missing or unreadable file is
//! fatal before any article is processed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Rights strings with bundled license texts shipped alongside the binary.
pub const KNOWN_LICENSES: &[(&str, &str)] = &[
    (
        "Creative Commons Attribution-Share Alike 3.0 Unported",
        "licenses/ccasau-3.0.txt",
    ),
    ("GNU Free Documentation License 1.2", "licenses/gfdl-1.2.txt"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralInfo {
    pub sitename: String,
    pub lang: String,
    pub server: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub rights: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicWord {
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteInfo {
    pub general: GeneralInfo,
    #[serde(default)]
    pub magicwords: Vec<MagicWord>,
}

impl SiteInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Site info file not found: {}", path.display()))?;
        let info: SiteInfo = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse site info: {}", path.display()))?;

        info!(
            sitename = info.general.sitename,
            lang = info.general.lang,
            "Site info loaded"
        );

        Ok(info)
    }

    /// Redirect directive aliases with lower/upper variants, in first-seen
    /// order. Alias matching downstream is first-match-wins, so the order
    /// is kept stable rather than collected into a set.
    pub fn redirect_aliases(&self) -> Vec<String> {
        let mut aliases = Vec::new();
        let mut push = |alias: String| {
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        };

        for word in &self.magicwords {
            if word.name != "redirect" {
                continue;
            }
            for alias in &word.aliases {
                push(alias.clone());
                push(alias.to_lowercase());
                push(alias.to_uppercase());
            }
        }

        aliases
    }

    /// Bundled license file for the site's rights string, if known.
    pub fn license_file(&self) -> Option<&'static str> {
        KNOWN_LICENSES
            .iter()
            .find(|(rights, _)| *rights == self.general.rights)
            .map(|(_, file)| *file)
    }
}

/// Canonicalizes a title the way the wiki's namespace handler would:
/// underscores become spaces, surrounding whitespace is dropped, and the
/// first character is upper-cased.
pub fn fqname(title: &str) -> String {
    let cleaned = title.replace('_', " ");
    let trimmed = cleaned.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
