//! Markup parser seam.
//!
//! The real wiki-markup grammar lives in an external parsing library; the
//! pipeline consumes it through [`MarkupParser`] and never looks at raw
//! markup past the redirect check. [`BasicParser`] is the built-in
//! fallback used by the CLI: a regex-level reader that recognizes
//! headings, paragraphs, internal/external links, categories and language
//! links, and treats everything else as plain text. It makes no attempt at
//! template expansion or nested sections.

use crate::tree::{Node, NodeKind};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

pub trait MarkupParser: Send + Sync {
    /// Parses raw article text into a document tree rooted at an
    /// `Article` node. May fail on malformed input; the pipeline converts
    /// any error into a uniform conversion failure.
    fn parse(&self, title: &str, raw_text: &str) -> Result<Node>;
}

static HEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(={2,6})\s*(.+?)\s*={2,6}\s*$").unwrap());

static INLINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]]+?)\]\]|\[(https?://\S+?)(?:\s+([^\]]+))?\]").unwrap()
});

static LANG_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(?:-[a-z0-9]+)*$").unwrap());

#[derive(Debug, Default)]
pub struct BasicParser;

impl BasicParser {
    pub fn new() -> Self {
        BasicParser
    }
}

impl MarkupParser for BasicParser {
    fn parse(&self, title: &str, raw_text: &str) -> Result<Node> {
        let mut article = Node::new(NodeKind::Article {
            caption: title.to_string(),
        });
        // Sections are kept flat: each heading starts a new section
        // appended to the root, with its heading text as the first child.
        let mut section: Option<Node> = None;
        let mut paragraph: Vec<String> = Vec::new();

        let flush_paragraph =
            |section: &mut Option<Node>, article: &mut Node, buf: &mut Vec<String>| {
                if buf.is_empty() {
                    return;
                }
                let text = buf.join("\n");
                buf.clear();
                let node =
                    Node::new(NodeKind::Paragraph).with_children(parse_inline(&text));
                match section {
                    Some(s) => s.children.push(node),
                    None => article.children.push(node),
                }
            };

        for line in raw_text.lines() {
            if let Some(caps) = HEADING_REGEX.captures(line) {
                flush_paragraph(&mut section, &mut article, &mut paragraph);
                if let Some(done) = section.take() {
                    article.children.push(done);
                }
                let level = (caps[1].len() as u8).saturating_sub(2);
                section = Some(
                    Node::new(NodeKind::Section { level })
                        .with_child(Node::text(caps[2].to_string())),
                );
            } else if line.trim().is_empty() {
                flush_paragraph(&mut section, &mut article, &mut paragraph);
            } else {
                paragraph.push(line.to_string());
            }
        }

        flush_paragraph(&mut section, &mut article, &mut paragraph);
        if let Some(done) = section.take() {
            article.children.push(done);
        }

        Ok(article)
    }
}

/// Splits a paragraph into text runs and link nodes.
fn parse_inline(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut last = 0;

    for caps in INLINE_REGEX.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if whole.start() > last {
            nodes.push(Node::text(&text[last..whole.start()]));
        }
        last = whole.end();

        if let Some(inner) = caps.get(1) {
            nodes.push(wiki_link(inner.as_str()));
        } else if let Some(url) = caps.get(2) {
            let mut node = Node::new(NodeKind::NamedUrl {
                url: url.as_str().to_string(),
            });
            if let Some(label) = caps.get(3) {
                node.children.push(Node::text(label.as_str().trim()));
            }
            nodes.push(node);
        }
    }

    if last < text.len() {
        nodes.push(Node::text(&text[last..]));
    }

    nodes
}

/// Classifies the inside of a `[[...]]` link.
fn wiki_link(inner: &str) -> Node {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target.trim(), Some(label.trim())),
        None => (inner.trim(), None),
    };

    if let Some((namespace, rest)) = target.split_once(':') {
        if namespace.eq_ignore_ascii_case("category") {
            return Node::new(NodeKind::CategoryLink {
                target: rest.trim().to_string(),
            });
        }
        if LANG_PREFIX_REGEX.is_match(namespace) {
            return Node::new(NodeKind::LanguageLink {
                namespace: namespace.to_string(),
                target: target.to_string(),
            });
        }
    }

    let mut node = Node::new(NodeKind::Link {
        target: target.to_string(),
    });
    if let Some(label) = label {
        node.children.push(Node::text(label));
    }
    node
}
