use serde::Serialize;

/// A cross-reference to an equivalent article in another language edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageLink {
    pub namespace: String,
    pub target: String,
}

/// The structured outcome of processing one title through the pipeline.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub title: String,
    /// Serialized article body: `[text, tags]` for articles,
    /// `["", [], {"r": target}]` for redirects.
    pub payload: String,
    pub is_redirect: bool,
    pub language_links: Vec<LanguageLink>,
    pub size: u64,
}

#[derive(Serialize)]
struct RedirectMeta<'a> {
    r: &'a str,
}

/// Serializes an article body. serde_json leaves non-ASCII text unescaped,
/// so titles and bodies round-trip losslessly.
pub fn article_payload(text: &str, tags: &[String]) -> String {
    serde_json::to_string(&(text, tags)).expect("article payload serialization cannot fail")
}

fn redirect_payload(target: &str) -> String {
    let empty: [&str; 0] = [];
    serde_json::to_string(&("", empty, RedirectMeta { r: target }))
        .expect("redirect payload serialization cannot fail")
}

/// Builds the redirect record for `title` pointing at `target`.
pub fn mkredirect(title: &str, target: &str, size: u64) -> ConversionResult {
    ConversionResult {
        title: title.to_string(),
        payload: redirect_payload(target),
        is_redirect: true,
        language_links: Vec::new(),
        size,
    }
}
