use ego_tree::iter::Edge;
use scraper::{ElementRef, Html, Node};

use crate::record::normalize_text;

/// Structural unit of a page, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    /// Paragraph-level text: p, li, table cell, or a div holding only inline content.
    Item(String),
    Link { text: String, href: String },
}

/// Elements whose whole subtree counts as one text item.
const ITEM_TAGS: &[&str] = &[
    "p", "li", "dd", "dt", "td", "th", "blockquote", "figcaption", "summary",
];

/// Containers that become an item only when they hold no block children.
const CONTAINER_TAGS: &[&str] = &["div", "section", "article", "main", "aside"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const SKIP_TAGS: &[&str] = &["head", "script", "style", "noscript", "template", "svg", "iframe"];

pub fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Flatten a document into headings, text items and links.
pub fn classify_nodes(document: &Html) -> Vec<Block> {
    let mut blocks = Vec::new();

    for node in document.root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let name = el.value().name();
        if is_skipped(el) {
            continue;
        }

        if let Some(level) = heading_level(name) {
            let text = element_text(el);
            if !text.is_empty() {
                blocks.push(Block::Heading { level, text });
            }
            continue;
        }

        if name == "a" {
            if let Some(href) = el.value().attr("href") {
                blocks.push(Block::Link {
                    text: element_text(el),
                    href: href.trim().to_string(),
                });
            }
            continue;
        }

        let is_item = is_item_element(el)
            || (CONTAINER_TAGS.contains(&name) && !has_block_child(el));
        if is_item && !has_item_ancestor(el) {
            let text = element_text(el);
            if !text.is_empty() {
                blocks.push(Block::Item(text));
            }
        }
    }

    blocks
}

/// Render the document to visible text lines, breaking at block boundaries.
pub fn rendered_lines(document: &Html) -> Vec<String> {
    let mut out = String::new();
    let mut skip_depth = 0usize;

    for edge in document.root_element().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(e) if SKIP_TAGS.contains(&e.name()) => skip_depth += 1,
                Node::Element(e) if skip_depth == 0 => {
                    if BLOCK_TAGS.contains(&e.name()) || e.name() == "br" {
                        out.push('\n');
                    }
                }
                Node::Text(t) if skip_depth == 0 => {
                    // Source newlines inside a text node are not rendered breaks.
                    out.extend(t.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(e) = node.value() {
                    if SKIP_TAGS.contains(&e.name()) {
                        skip_depth = skip_depth.saturating_sub(1);
                    } else if skip_depth == 0 && BLOCK_TAGS.contains(&e.name()) {
                        out.push('\n');
                    }
                }
            }
        }
    }

    out.lines()
        .map(normalize_text)
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn element_text(el: ElementRef) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn is_skipped(el: ElementRef) -> bool {
    SKIP_TAGS.contains(&el.value().name())
        || el
            .ancestors()
            .filter_map(|n| n.value().as_element())
            .any(|e| SKIP_TAGS.contains(&e.name()))
}

/// An item tag wrapping a heading (accordion and card lists) is walked like
/// a container so the heading lands before the text it introduces.
fn is_item_element(el: ElementRef) -> bool {
    ITEM_TAGS.contains(&el.value().name()) && !has_heading_descendant(el)
}

fn has_heading_descendant(el: ElementRef) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|d| heading_level(d.value().name()).is_some())
}

fn has_item_ancestor(el: ElementRef) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(is_item_element)
}

fn has_block_child(el: ElementRef) -> bool {
    el.children()
        .filter_map(ElementRef::wrap)
        .any(|c| BLOCK_TAGS.contains(&c.value().name()))
}
