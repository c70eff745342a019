use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use ego_tree::NodeRef;
use mirror_core::{extension_of, is_html_content_type};
use regex::Regex;
use scraper::node::Node;
use scraper::Html;
use url::Url;

use crate::frontier::normalize_url;

/// Element attributes that carry a fetchable reference.
pub const LINK_ATTRIBUTES: [&str; 4] = ["src", "href", "data", "poster"];

const IGNORED_PREFIXES: [&str; 5] = ["mailto:", "javascript:", "data:", "tel:", "about:"];

/// CSS `url(...)` reference: group 1 is the opening quote, group 2 the value.
pub(crate) static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)(.*?)['"]?\s*\)"#).expect("css url pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Other,
}

impl ContentKind {
    /// Classify a downloaded file by content type, then by extension.
    pub fn detect(path: &Path, content_type: Option<&str>) -> Self {
        if is_html_content_type(content_type) {
            return ContentKind::Html;
        }
        let essence = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());
        if essence.as_deref() == Some("text/css") {
            return ContentKind::Css;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match extension_of(name).map(str::to_ascii_lowercase).as_deref() {
            Some("html" | "htm" | "xhtml") => ContentKind::Html,
            Some("css") => ContentKind::Css,
            _ => ContentKind::Other,
        }
    }

    pub fn has_links(self) -> bool {
        self != ContentKind::Other
    }
}

pub fn is_link_attribute(name: &str) -> bool {
    LINK_ATTRIBUTES
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Absolute, fragment-free URLs referenced by a document, in order of
/// first appearance.
///
/// HTML contributes every `src`/`href`/`data`/`poster` attribute; both HTML
/// and CSS contribute `url(...)` references found anywhere in the text.
/// The HTML parser is lenient, so malformed markup only yields fewer links.
pub fn extract_links(content: &str, kind: ContentKind, source: &Url) -> Vec<Url> {
    let mut raw: Vec<String> = Vec::new();
    if kind == ContentKind::Html {
        let document = Html::parse_document(content);
        for node in document.tree.root().descendants() {
            raw.extend(attribute_links(node));
        }
    }
    if kind.has_links() {
        raw.extend(css_urls(content).map(str::to_string));
    }

    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|reference| resolve_link(reference, source))
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect()
}

fn attribute_links(node: NodeRef<'_, Node>) -> Vec<String> {
    match node.value() {
        Node::Element(element) => element
            .attrs()
            .filter(|(name, _)| is_link_attribute(name))
            .map(|(_, value)| value.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Values inside every `url(...)` in the text.
pub fn css_urls(text: &str) -> impl Iterator<Item = &str> {
    CSS_URL
        .captures_iter(text)
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
}

/// Resolve a reference against the page it appeared on. Fragment-only,
/// empty and non-fetchable references yield `None`.
pub fn resolve_link(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if IGNORED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return None;
    }
    let url = base.join(trimmed).ok()?;
    match url.scheme() {
        "http" | "https" => Some(normalize_url(&url)),
        _ => None,
    }
}
