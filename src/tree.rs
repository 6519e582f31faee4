//! Document-tree vocabulary shared between the markup parser and the
//! renderer.
//!
//! A parsed article is a tree of [`Node`]s over a closed set of kinds. The
//! renderer dispatches on [`NodeKind`] with an explicit match; simple
//! formatting kinds all funnel through the generic-element path, so adding
//! a new inline tag does not require touching the renderer's structure.
//!
//! Conventions:
//! - `Section` nodes hold their heading content as the first child; the
//!   remaining children are the section body.
//! - Attributes are ordered `(name, value)` pairs; `class` and `id` are
//!   the only ones the content filter consults.

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Document root; caption is the article title.
    Article { caption: String },
    /// Top-level heading block below the article root.
    Chapter { caption: String },
    /// Section at the given nesting level (0 = outermost, rendered as h2);
    /// first child is the heading content.
    Section { level: u8 },
    Paragraph,
    Text(String),
    /// Internal link (article, interwiki and namespace links all map here).
    Link { target: String },
    SpecialLink { url: Option<String>, target: String },
    /// Bare external URL.
    Url { url: String },
    /// Bracketed external link with an optional label in its children.
    NamedUrl { url: String },
    CategoryLink { target: String },
    LanguageLink { namespace: String, target: String },
    ImageLink,
    ImageMap,
    Gallery,
    Math { source: String },
    Timeline { source: String },
    Hiero { source: String },
    Reference { group: String, name: Option<String> },
    ReferenceList { group: String },
    Table,
    /// Catch-all for simple HTML-like elements (em, strong, sub, sup,
    /// code, div, span, dl, dt, dd, hr, br, ...).
    Generic { tag: String },
    Overline,
    Underline,
    Center,
    Source,
    Strike,
    Blockquote,
    Indented,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Node::new(NodeKind::Text(content.into()))
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whitespace-separated CSS classes of this node.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}
