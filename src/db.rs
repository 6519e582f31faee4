//! Article database interface.
//!
//! The compiled wiki database is an external collaborator; the pipeline
//! only needs the narrow read-only surface below, scoped to the article
//! namespace. [`MemoryDb`] is the reference implementation used by the CLI
//! (loaded from a JSON object of title -> raw text) and by tests.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

pub trait ArticleDb: Send + Sync {
    /// Raw wiki text for a title, `None` when the title is absent.
    fn get(&self, title: &str) -> Option<String>;

    /// Stored size in bytes for a title.
    fn get_size(&self, title: &str) -> Option<u64>;

    fn contains(&self, title: &str) -> bool {
        self.get_size(title).is_some()
    }

    /// Article titles in database order.
    fn titles(&self) -> Box<dyn Iterator<Item = String> + '_>;

    fn titles_with_sizes(&self) -> Box<dyn Iterator<Item = (String, u64)> + '_> {
        Box::new(self.titles().map(move |title| {
            let size = self.get_size(&title).unwrap_or(0);
            (title, size)
        }))
    }
}

/// In-memory article store preserving insertion order.
#[derive(Default)]
pub struct MemoryDb {
    order: Vec<String>,
    articles: FxHashMap<String, String>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: impl Into<String>, text: impl Into<String>) {
        let title = title.into();
        if !self.articles.contains_key(&title) {
            self.order.push(title.clone());
        }
        self.articles.insert(title, text.into());
    }

    /// Loads a JSON object mapping title to raw article text.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Article database not found: {}", path.display()))?;
        let entries: Vec<(String, String)> = {
            let map: serde_json::Map<String, serde_json::Value> =
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse database: {}", path.display()))?;
            map.into_iter()
                .map(|(title, text)| {
                    let text = text
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_default();
                    (title, text)
                })
                .collect()
        };

        let mut db = MemoryDb::new();
        for (title, text) in entries {
            db.insert(title, text);
        }

        info!(articles = db.order.len(), "Article database loaded");
        Ok(db)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl ArticleDb for MemoryDb {
    fn get(&self, title: &str) -> Option<String> {
        self.articles.get(title).cloned()
    }

    fn get_size(&self, title: &str) -> Option<u64> {
        self.articles.get(title).map(|text| text.len() as u64)
    }

    fn contains(&self, title: &str) -> bool {
        self.articles.contains_key(title)
    }

    fn titles(&self) -> Box<dyn Iterator<Item = String> + '_> {
        Box::new(self.order.iter().cloned())
    }
}
