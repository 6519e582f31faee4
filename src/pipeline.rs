//! Per-article conversion pipeline.
//!
//! `fetch -> redirect check -> parse -> render -> filter`, short-circuiting
//! on redirects and classifying every failure into the two-outcome
//! taxonomy of [`ConvertError`]. The context a conversion runs against is
//! built once per worker from immutable configuration and threaded through
//! explicitly; nothing here reads ambient global state.

use crate::db::ArticleDb;
use crate::error::ConvertError;
use crate::filters::FilterConfig;
use crate::models::{article_payload, mkredirect, ConversionResult};
use crate::parser::MarkupParser;
use crate::redirect::parse_redirect;
use crate::render::{MathRenderer, Renderer};
use crate::siteinfo::fqname;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything a worker needs to convert one title. All fields are
/// read-only shares of configuration loaded before the batch started.
#[derive(Clone)]
pub struct ConvertContext {
    pub db: Arc<dyn ArticleDb>,
    pub parser: Arc<dyn MarkupParser>,
    pub filters: Arc<FilterConfig>,
    pub redirect_aliases: Arc<Vec<String>>,
    pub math: Option<Arc<dyn MathRenderer>>,
}

/// Converts one title to its serialized record.
///
/// Returns `ConvertError::Empty` for titles with no content (including
/// titles the filter configuration excludes from the output set) and
/// `ConvertError::Failed` for anything that went wrong between redirect
/// parsing and rendering. Low-level causes are logged here with the title
/// and never surface past this boundary.
pub fn convert(ctx: &ConvertContext, title: &str) -> Result<ConversionResult, ConvertError> {
    if ctx.filters.is_page_excluded(title) {
        debug!(title, "Skipping excluded page");
        return Err(ConvertError::empty(title));
    }

    let text = ctx.db.get(title).unwrap_or_default();
    if text.is_empty() {
        return Err(ConvertError::empty(title));
    }
    let size = ctx.db.get_size(title).unwrap_or(0);

    match parse_redirect(&text, &ctx.redirect_aliases) {
        Ok(Some(target)) => {
            return Ok(mkredirect(title, &fqname(&target), size));
        }
        Ok(None) => {}
        Err(e) => {
            warn!(title, error = %e, "Malformed redirect directive");
            return Err(ConvertError::failed(title));
        }
    }

    let tree = ctx.parser.parse(title, &text).map_err(|e| {
        error!(title, error = %e, "Failed to parse article");
        ConvertError::failed(title)
    })?;

    let mut renderer = Renderer::new(&ctx.filters);
    if let Some(math) = &ctx.math {
        renderer = renderer.with_math(math.as_ref());
    }
    let rendered = renderer.render(&tree).map_err(|e| {
        error!(title, error = %e, "Failed to render article");
        ConvertError::failed(title)
    })?;

    let body = ctx.filters.apply_replacements(rendered.text);
    let body = body.trim_end();

    Ok(ConversionResult {
        title: title.to_string(),
        payload: article_payload(body, &rendered.tags),
        is_redirect: false,
        language_links: rendered.language_links,
        size,
    })
}
