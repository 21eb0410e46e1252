use std::collections::HashSet;

use url::Url;

use crate::parser::blocks::Block;

const LINK_KEYWORDS: &[&str] = &[
    "admission",
    "apply",
    "application",
    "course",
    "program",
    "undergraduate",
    "requirement",
];

const IGNORED_SCHEMES: &[&str] = &["mailto:", "javascript:", "tel:", "data:"];

/// A same-site page worth following when the primary page yields nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryLink {
    pub anchor_text: String,
    pub url: String,
}

/// Anchors whose text or href mentions admissions, applying or courses,
/// resolved against `source` and deduplicated in document order.
pub fn discover(blocks: &[Block], source: &Url) -> Vec<SecondaryLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let source_key = without_fragment(source);

    for block in blocks {
        let Block::Link { text, href } = block else {
            continue;
        };
        let href_lower = href.to_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || IGNORED_SCHEMES.iter().any(|s| href_lower.starts_with(s))
        {
            continue;
        }
        let text_lower = text.to_lowercase();
        if !LINK_KEYWORDS
            .iter()
            .any(|k| text_lower.contains(k) || href_lower.contains(k))
        {
            continue;
        }

        let Ok(resolved) = source.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") || !same_site(&resolved, source) {
            continue;
        }
        let key = without_fragment(&resolved);
        if key == source_key || !seen.insert(key.clone()) {
            continue;
        }
        links.push(SecondaryLink {
            anchor_text: text.clone(),
            url: key,
        });
    }

    links
}

fn without_fragment(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.to_string()
}

fn site(url: &Url) -> String {
    url.host_str()
        .unwrap_or("")
        .trim_start_matches("www.")
        .to_lowercase()
}

/// Same host, or one host a subdomain of the other.
fn same_site(a: &Url, b: &Url) -> bool {
    let (a, b) = (site(a), site(b));
    !a.is_empty()
        && (a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a)))
}
