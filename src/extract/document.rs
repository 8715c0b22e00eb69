// src/extract/document.rs

//! Parsed-document capability used by the field locator.
//!
//! Extraction code only needs three things from a page: find nodes whose
//! text contains a string, read a node's text, and read the text right after
//! a node. [`TextDocument`] captures exactly that, and [`HtmlPage`] provides
//! it over `scraper`.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{AppError, Result};

/// Elements whose content is never page text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "footer", "select", "head",
];

/// Elements that do not break words when their text is joined.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "code", "em", "font", "i", "mark", "small", "span", "strong",
    "sub", "sup", "u",
];

/// Optional restriction on which nodes may match.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFilter<'f> {
    /// Element name, e.g. `dt`
    pub tag: Option<&'f str>,
    /// Substring the `class` attribute must contain
    pub class_contains: Option<&'f str>,
}

impl<'f> NodeFilter<'f> {
    pub fn tag(tag: &'f str) -> Self {
        Self {
            tag: Some(tag),
            class_contains: None,
        }
    }

    pub fn class_contains(class: &'f str) -> Self {
        Self {
            tag: None,
            class_contains: Some(class),
        }
    }
}

/// Text-level view of a parsed page.
pub trait TextDocument {
    type Node<'a>: Copy
    where
        Self: 'a;

    /// Innermost nodes whose text contains `needle` (ASCII case-insensitive),
    /// in document order.
    fn find_containing<'a>(&'a self, needle: &str, filter: &NodeFilter<'_>) -> Vec<Self::Node<'a>>;

    /// Whitespace-collapsed text of a node.
    fn node_text(&self, node: Self::Node<'_>) -> String;

    /// Text of the next meaningful sibling, skipping blank text and comments.
    fn next_sibling_text(&self, node: Self::Node<'_>) -> Option<String>;

    /// Whitespace-collapsed text of the whole page.
    fn text(&self) -> &str;
}

/// An HTML page parsed once, with its visible text precomputed.
pub struct HtmlPage {
    html: Html,
    url: Option<Url>,
    text: String,
    text_lower: String,
}

impl HtmlPage {
    /// Parse page content. An unparsable `url` only disables link resolution.
    pub fn parse(content: &str, url: &str) -> Self {
        let html = Html::parse_document(content);
        let text = element_text(html.root_element());
        let text_lower = text.to_ascii_lowercase();
        Self {
            html,
            url: Url::parse(url).ok(),
            text,
            text_lower,
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn url_str(&self) -> &str {
        self.url.as_ref().map_or("", Url::as_str)
    }

    /// True if the page has no visible text at all.
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// Resolve a link against the page URL.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        match &self.url {
            Some(base) => base.join(href).ok().map(|u| u.to_string()),
            None => Url::parse(href).ok().map(|u| u.to_string()),
        }
    }

    /// Text of every element matching `selector`, blanks dropped.
    pub fn select_texts(&self, selector: &Selector) -> Vec<String> {
        self.html
            .select(selector)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Text of the first non-blank element matching `selector`.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.html
            .select(selector)
            .map(element_text)
            .find(|t| !t.is_empty())
    }
}

impl TextDocument for HtmlPage {
    type Node<'a> = ElementRef<'a>;

    fn find_containing<'a>(&'a self, needle: &str, filter: &NodeFilter<'_>) -> Vec<ElementRef<'a>> {
        let needle = needle.trim().to_ascii_lowercase();
        if needle.is_empty() || !self.text_lower.contains(&needle) {
            return Vec::new();
        }

        let mut matches: Vec<ElementRef<'a>> = self
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| !is_skipped(el))
            .filter(|el| accepts(el, filter))
            .filter(|el| element_text(*el).to_ascii_lowercase().contains(&needle))
            .collect();

        // Every ancestor of a label also contains its text; keep the innermost.
        let ids: HashSet<_> = matches.iter().map(|m| m.id()).collect();
        let mut outer = HashSet::new();
        for m in &matches {
            for ancestor in m.ancestors() {
                if ids.contains(&ancestor.id()) {
                    outer.insert(ancestor.id());
                }
            }
        }
        matches.retain(|m| !outer.contains(&m.id()));
        matches
    }

    fn node_text(&self, node: ElementRef<'_>) -> String {
        element_text(node)
    }

    fn next_sibling_text(&self, node: ElementRef<'_>) -> Option<String> {
        let mut current = node;
        // A label wrapped alone in its own container pairs with the container's sibling.
        for _ in 0..3 {
            if let Some(text) = sibling_text(current) {
                return Some(text);
            }
            let parent = current.parent().and_then(ElementRef::wrap)?;
            if element_text(parent) != element_text(current) {
                return None;
            }
            current = parent;
        }
        None
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, whitespace-collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(el, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if !SKIPPED_TAGS.contains(&element.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let block = !INLINE_TAGS.contains(&element.name());
                    if block {
                        out.push(' ');
                    }
                    collect_text(child_el, out);
                    if block {
                        out.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
}

fn sibling_text(el: ElementRef<'_>) -> Option<String> {
    let mut sibling = el.next_sibling();
    while let Some(node) = sibling {
        match node.value() {
            Node::Text(text) if !text.trim().is_empty() => return Some(collapse_whitespace(text)),
            Node::Element(element) if !SKIPPED_TAGS.contains(&element.name()) => {
                let text = ElementRef::wrap(node).map(element_text).unwrap_or_default();
                return (!text.is_empty()).then_some(text);
            }
            _ => {}
        }
        sibling = node.next_sibling();
    }
    None
}

fn is_skipped(el: &ElementRef<'_>) -> bool {
    SKIPPED_TAGS.contains(&el.value().name())
        || el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| SKIPPED_TAGS.contains(&a.value().name()))
}

fn accepts(el: &ElementRef<'_>, filter: &NodeFilter<'_>) -> bool {
    let element = el.value();
    if let Some(tag) = filter.tag {
        if !element.name().eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(class) = filter.class_contains {
        let class = class.to_ascii_lowercase();
        let matches = element
            .attr("class")
            .is_some_and(|c| c.to_ascii_lowercase().contains(&class));
        if !matches {
            return false;
        }
    }
    true
}
