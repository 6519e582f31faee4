//! Document tree to constrained XHTML.
//!
//! The renderer walks a parsed article tree and emits a single well-formed
//! root element. Dispatch is an explicit match over the closed node-kind
//! set; every simple kind resolves to a [`Disposition`] and the handful of
//! structural kinds (article, sections, references, math) have dedicated
//! walkers. Image links, image maps, galleries and category links are not
//! part of the renderable subset and are elided with their children, as is
//! any element the content filter excludes.
//!
//! Renderer state (reference tracker, external-link counter, collected
//! language links) lives for exactly one article render.

use crate::filters::FilterConfig;
use crate::models::LanguageLink;
use crate::refs::{self, RefTracker};
use crate::tree::{Node, NodeKind};
use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::warn;

/// External math renderer producing an image data URI from TeX source.
/// Rendering failures degrade the node to plain text; they never fail the
/// article.
pub trait MathRenderer: Send + Sync {
    fn render(&self, source: &str) -> Result<String>;
}

/// Output of one article render.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub text: String,
    pub tags: Vec<String>,
    pub language_links: Vec<LanguageLink>,
}

/// How a node is realized in the output.
enum Disposition {
    /// Emit the element, then render the node's children inside it.
    Element(ElementSpec),
    /// Emit the element as-is; the node's children are not visited.
    ElementOnly(ElementSpec),
    /// Skip the node and its entire subtree.
    Suppressed,
}

struct ElementSpec {
    tag: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
}

impl ElementSpec {
    fn new(tag: &str) -> Self {
        ElementSpec {
            tag: tag.to_string(),
            attrs: Vec::new(),
            text: None,
        }
    }

    fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

type XmlWriter = Writer<Vec<u8>>;

pub struct Renderer<'a> {
    filters: &'a FilterConfig,
    math: Option<&'a dyn MathRenderer>,
    refs: RefTracker,
    named_link_count: usize,
    language_links: Vec<LanguageLink>,
    tags: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new(filters: &'a FilterConfig) -> Self {
        Renderer {
            filters,
            math: None,
            refs: RefTracker::new(),
            named_link_count: 1,
            language_links: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_math(mut self, math: &'a dyn MathRenderer) -> Self {
        self.math = Some(math);
        self
    }

    /// Renders the tree to its serialized form, consuming the renderer:
    /// per-article state cannot leak into the next document.
    pub fn render(mut self, root: &Node) -> Result<Rendered> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(&mut writer, root)?;
        let text = String::from_utf8(writer.into_inner())?;

        Ok(Rendered {
            text,
            tags: self.tags,
            language_links: self.language_links,
        })
    }

    fn write_node(&mut self, w: &mut XmlWriter, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Text(content) => write_text(w, content),
            NodeKind::Article { caption } | NodeKind::Chapter { caption } => {
                self.write_titled_block(w, caption, &node.children)
            }
            NodeKind::Section { level } => self.write_section(w, *level, &node.children),
            NodeKind::Math { source } => self.write_math(w, source),
            NodeKind::Timeline { source } => {
                write_placeholder(w, "application/mediawiki-timeline", source, "Timeline")
            }
            NodeKind::Hiero { source } => {
                write_placeholder(w, "application/mediawiki-hiero", source, "Hiero")
            }
            NodeKind::LanguageLink { namespace, target } => {
                self.language_links.push(LanguageLink {
                    namespace: namespace.clone(),
                    target: target.clone(),
                });
                Ok(())
            }
            NodeKind::ReferenceList { group } => self.write_reference_list(w, group),
            _ => match self.classify(node) {
                Disposition::Element(spec) => self.write_element(w, spec, Some(node)),
                Disposition::ElementOnly(spec) => self.write_element(w, spec, None),
                Disposition::Suppressed => Ok(()),
            },
        }
    }

    /// Resolves the simple node kinds to their output elements.
    fn classify(&mut self, node: &Node) -> Disposition {
        use Disposition::{Element, ElementOnly, Suppressed};

        match &node.kind {
            // Block container instead of a real paragraph: the parser
            // wraps block elements in paragraphs, which XHTML forbids.
            NodeKind::Paragraph => Element(ElementSpec::new("div")),
            NodeKind::Link { target } => {
                let spec = ElementSpec::new("a").attr("href", target.clone());
                if node.children.is_empty() {
                    ElementOnly(spec.text(target.clone()))
                } else {
                    Element(spec)
                }
            }
            NodeKind::SpecialLink { url, target } => {
                let href = url.clone().unwrap_or_else(|| "#".to_string());
                let spec = ElementSpec::new("a").attr("href", href);
                if node.children.is_empty() {
                    ElementOnly(spec.text(target.clone()))
                } else {
                    Element(spec)
                }
            }
            NodeKind::Url { url } => {
                let spec = ElementSpec::new("a")
                    .attr("href", url.clone())
                    .attr("class", "mwx.link.external");
                if node.children.is_empty() {
                    ElementOnly(spec.text(url.clone()))
                } else {
                    Element(spec)
                }
            }
            NodeKind::NamedUrl { url } => {
                let spec = ElementSpec::new("a").attr("href", url.clone());
                if node.children.is_empty() {
                    let label = format!("[{}]", self.named_link_count);
                    self.named_link_count += 1;
                    ElementOnly(spec.text(label))
                } else {
                    Element(spec)
                }
            }
            NodeKind::Reference { .. } => {
                let marker = self.refs.register(node);
                ElementOnly(
                    ElementSpec::new("a")
                        .attr("id", marker.backref_id)
                        .attr("href", "#")
                        .attr("onClick", format!("return s('{}')", marker.note_id))
                        .text(marker.text),
                )
            }
            NodeKind::CategoryLink { .. }
            | NodeKind::ImageLink
            | NodeKind::ImageMap
            | NodeKind::Gallery => Suppressed,
            NodeKind::Table => {
                if self.is_excluded(node) {
                    Suppressed
                } else {
                    Element(passthrough(ElementSpec::new("table"), node))
                }
            }
            NodeKind::Generic { tag } => {
                if self.is_excluded(node) {
                    Suppressed
                } else {
                    Element(passthrough(ElementSpec::new(tag), node))
                }
            }
            NodeKind::Overline => Element(ElementSpec::new("span").attr("class", "o")),
            NodeKind::Underline => Element(ElementSpec::new("span").attr("class", "u")),
            NodeKind::Center => Element(ElementSpec::new("span").attr("class", "center")),
            NodeKind::Source => Element(ElementSpec::new("code")),
            NodeKind::Strike => Element(ElementSpec::new("del")),
            NodeKind::Blockquote => Element(ElementSpec::new("blockquote")),
            NodeKind::Indented => {
                Element(ElementSpec::new("blockquote").attr("class", "indent"))
            }
            // Structural kinds are handled before classification.
            NodeKind::Article { .. }
            | NodeKind::Chapter { .. }
            | NodeKind::Section { .. }
            | NodeKind::Text(_)
            | NodeKind::Math { .. }
            | NodeKind::Timeline { .. }
            | NodeKind::Hiero { .. }
            | NodeKind::LanguageLink { .. }
            | NodeKind::ReferenceList { .. } => unreachable!("structural kind in classify"),
        }
    }

    fn is_excluded(&self, node: &Node) -> bool {
        if self.filters.is_class_excluded(node.classes()) {
            return true;
        }
        node.attr("id")
            .map(|id| self.filters.is_id_excluded(id))
            .unwrap_or(false)
    }

    fn write_element(
        &mut self,
        w: &mut XmlWriter,
        spec: ElementSpec,
        children_of: Option<&Node>,
    ) -> Result<()> {
        if is_void_tag(&spec.tag) {
            let mut el = BytesStart::new(spec.tag.as_str());
            for (name, value) in &spec.attrs {
                el.push_attribute((name.as_str(), value.as_str()));
            }
            w.write_event(Event::Empty(el))?;
            return Ok(());
        }

        let mut el = BytesStart::new(spec.tag.as_str());
        for (name, value) in &spec.attrs {
            el.push_attribute((name.as_str(), value.as_str()));
        }
        w.write_event(Event::Start(el))?;

        if let Some(text) = &spec.text {
            write_text(w, text)?;
        }
        if let Some(node) = children_of {
            for child in &node.children {
                self.write_node(w, child)?;
            }
        }

        w.write_event(Event::End(BytesEnd::new(spec.tag.as_str())))?;
        Ok(())
    }

    /// `<div><h1>caption</h1>...children...</div>`, the article root shape.
    fn write_titled_block(
        &mut self,
        w: &mut XmlWriter,
        caption: &str,
        children: &[Node],
    ) -> Result<()> {
        start_tag(w, "div", &[])?;
        start_tag(w, "h1", &[])?;
        write_text(w, caption)?;
        end_tag(w, "h1")?;
        for child in children {
            self.write_node(w, child)?;
        }
        end_tag(w, "div")
    }

    fn write_section(&mut self, w: &mut XmlWriter, level: u8, children: &[Node]) -> Result<()> {
        // h2 for the outermost section, deeper levels down to h6.
        let heading = format!("h{}", (level as usize + 2).min(6));
        start_tag(w, "div", &[])?;

        let mut rest = children;
        if let Some((first, tail)) = children.split_first() {
            start_tag(w, &heading, &[])?;
            self.write_node(w, first)?;
            end_tag(w, &heading)?;
            rest = tail;
        }

        for child in rest {
            self.write_node(w, child)?;
        }
        end_tag(w, "div")
    }

    fn write_math(&mut self, w: &mut XmlWriter, source: &str) -> Result<()> {
        let image = match self.math {
            Some(renderer) => match renderer.render(source) {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!(error = %e, source, "Failed to render math expression");
                    None
                }
            },
            None => None,
        };

        match image {
            Some(uri) => {
                let mut el = BytesStart::new("img");
                el.push_attribute(("src", uri.as_str()));
                el.push_attribute(("class", "tex"));
                w.write_event(Event::Empty(el))?;
                Ok(())
            }
            None => {
                start_tag(w, "span", &[("class", "tex")])?;
                write_text(w, source)?;
                end_tag(w, "span")
            }
        }
    }

    fn write_reference_list(&mut self, w: &mut XmlWriter, group: &str) -> Result<()> {
        if self.refs.is_empty() {
            return Ok(());
        }
        let collected = self.refs.pop_group(group);
        if collected.is_empty() {
            return Ok(());
        }

        start_tag(w, "ol", &[])?;
        for (i, reference) in collected.iter().enumerate() {
            let note_id = refs::note_id(group, i + 1);
            start_tag(w, "li", &[("id", note_id.as_str())])?;
            start_tag(w, "b", &[])?;

            let name = match &reference.kind {
                NodeKind::Reference { name, .. } => name.as_deref(),
                _ => None,
            };
            match name.map(|n| (n, self.refs.named_count(group, n))) {
                Some((_, 1)) => {
                    write_backref(w, &format!("_r{}_0", note_id), "\u{2191}")?;
                }
                Some((_, count)) if count > 1 => {
                    write_text(w, "\u{2191} ")?;
                    start_tag(w, "sup", &[])?;
                    for occurrence in 0..count {
                        let backref_id = format!("_r{}_{}", note_id, occurrence);
                        write_backref(w, &backref_id, &(occurrence + 1).to_string())?;
                        write_text(w, " ")?;
                    }
                    end_tag(w, "sup")?;
                }
                _ => {
                    write_backref(w, &format!("_r{}", note_id), "\u{2191}")?;
                }
            }

            end_tag(w, "b")?;
            write_text(w, " ")?;
            for child in &reference.children {
                self.write_node(w, child)?;
            }
            end_tag(w, "li")?;
        }
        end_tag(w, "ol")
    }
}

fn is_void_tag(tag: &str) -> bool {
    matches!(tag, "br" | "hr")
}

fn passthrough(mut spec: ElementSpec, node: &Node) -> ElementSpec {
    for (name, value) in &node.attrs {
        spec = spec.attr(name, value.clone());
    }
    spec
}

fn start_tag(w: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(tag);
    for attr in attrs {
        el.push_attribute(*attr);
    }
    w.write_event(Event::Start(el))?;
    Ok(())
}

fn end_tag(w: &mut XmlWriter, tag: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_text(w: &mut XmlWriter, text: &str) -> Result<()> {
    w.write_event(Event::Text(BytesText::new(text)))?;
    Ok(())
}

fn write_backref(w: &mut XmlWriter, backref_id: &str, label: &str) -> Result<()> {
    let href = format!("#{}", backref_id);
    let onclick = format!("return s('{}')", backref_id);
    start_tag(w, "a", &[("href", href.as_str()), ("onClick", onclick.as_str())])?;
    write_text(w, label)?;
    end_tag(w, "a")
}

fn write_placeholder(w: &mut XmlWriter, kind: &str, source: &str, label: &str) -> Result<()> {
    let src = format!("data:text/plain;charset=utf-8,{}", source);
    start_tag(w, "object", &[("type", kind), ("src", src.as_str())])?;
    start_tag(w, "em", &[])?;
    write_text(w, label)?;
    end_tag(w, "em")?;
    end_tag(w, "object")
}
