//! HTML-aware enrichment.
//!
//! The HTML path parses content into a fragment tree, enriches the text
//! nodes that carry URLs, and serializes the tree back out. URLs that are
//! already hyperlinked — text whose immediate parent is an `<a>` — are
//! left exactly as written.
//!
//! Parsing happens up front and produces a flat segment list (raw markup
//! interleaved with enrichable text), so no parser state is held across
//! await points.

use ego_tree::NodeRef;
use scraper::{Html, Node};

use super::{Consumer, contains_url};
use crate::providers::ResourceParams;
use crate::util::{escape_attr, escape_text};

/// Elements with no closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

enum Segment {
    /// Serialized markup emitted verbatim.
    Raw(String),
    /// Text-node content to run through enrichment.
    Enrich(String),
}

pub(crate) async fn devour(consumer: &Consumer, content: &str, params: &ResourceParams) -> String {
    let segments = segment_fragment(content);

    let mut out = String::with_capacity(content.len());
    for segment in segments {
        match segment {
            Segment::Raw(markup) => out.push_str(&markup),
            Segment::Enrich(text) => out.push_str(&consumer.enrich_urls(&text, params).await),
        }
    }
    out
}

/// Parse `content` and flatten it into raw/enrichable segments.
fn segment_fragment(content: &str) -> Vec<Segment> {
    let fragment = Html::parse_fragment(content);
    let mut segments = Vec::new();
    let mut raw = String::new();

    // parse_fragment wraps the content in a synthetic <html> root; walk its
    // children so the wrapper never appears in the output.
    for child in fragment.root_element().children() {
        serialize_node(child, &mut segments, &mut raw);
    }
    if !raw.is_empty() {
        segments.push(Segment::Raw(raw));
    }
    segments
}

fn serialize_node(node: NodeRef<'_, Node>, segments: &mut Vec<Segment>, raw: &mut String) {
    match node.value() {
        Node::Text(text) => {
            if contains_url(&text.text) && !is_anchored(&node) {
                if !raw.is_empty() {
                    segments.push(Segment::Raw(std::mem::take(raw)));
                }
                segments.push(Segment::Enrich(text.text.to_string()));
            } else {
                raw.push_str(&escape_text(&text.text));
            }
        }
        Node::Element(element) => {
            raw.push('<');
            raw.push_str(element.name());
            for (name, value) in element.attrs() {
                raw.push(' ');
                raw.push_str(name);
                raw.push_str("=\"");
                raw.push_str(&escape_attr(value));
                raw.push('"');
            }
            raw.push('>');
            if !VOID_ELEMENTS.contains(&element.name()) {
                for child in node.children() {
                    serialize_node(child, segments, raw);
                }
                raw.push_str("</");
                raw.push_str(element.name());
                raw.push('>');
            }
        }
        Node::Comment(comment) => {
            raw.push_str("<!--");
            raw.push_str(&comment.comment);
            raw.push_str("-->");
        }
        // Doctypes and processing instructions don't belong in fragments.
        _ => {}
    }
}

/// Whether the node's immediate parent is an `<a>` element.
fn is_anchored(node: &NodeRef<'_, Node>) -> bool {
    node.parent()
        .and_then(|parent| match parent.value() {
            Node::Element(element) => Some(element.name() == "a"),
            _ => None,
        })
        .unwrap_or(false)
}
