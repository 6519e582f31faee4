//! Language-link resolution.
//!
//! An article's extracted language links point at equivalent articles in
//! other language editions. For every configured target language whose
//! linked title is absent from the source database, a synthetic redirect
//! record (target title -> source article) is produced so the foreign
//! spelling still resolves in the packaged dictionary.

use crate::db::ArticleDb;
use crate::models::{mkredirect, ConversionResult, LanguageLink};
use crate::siteinfo::fqname;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

/// Builds the synthetic redirect records for `title`'s language links.
///
/// Links outside `languages` are ignored; a link whose target does not
/// carry its `namespace:` qualifier is malformed and skipped with a log
/// line. Duplicate unqualified targets collapse to one record.
pub fn synthesize_redirects(
    db: &dyn ArticleDb,
    languages: &FxHashSet<String>,
    title: &str,
    links: &[LanguageLink],
) -> Vec<ConversionResult> {
    let mut targets: Vec<String> = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    for link in links {
        if !languages.contains(&link.namespace) {
            continue;
        }
        debug!(
            title,
            target = link.target,
            namespace = link.namespace,
            "Language link"
        );

        let prefix = format!("{}:", link.namespace);
        let unqualified = match link.target.strip_prefix(&prefix) {
            Some(rest) => rest,
            None => {
                warn!(target = link.target, "Invalid language link");
                continue;
            }
        };

        if !db.contains(unqualified) && seen.insert(unqualified.to_string()) {
            targets.push(unqualified.to_string());
        }
    }

    targets
        .iter()
        .map(|target| mkredirect(&fqname(target), title, 0))
        .collect()
}
