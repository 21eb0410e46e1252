pub mod dates;
pub mod headings;
pub mod lines;
pub mod links;
pub mod selectors;

use scraper::Html;
use tracing::debug;

use super::blocks::{self, Block};
use crate::record::{Category, CategoryFields};

/// A parsed page with its flattened views precomputed once.
pub struct Page<'a> {
    pub document: &'a Html,
    pub blocks: Vec<Block>,
    pub lines: Vec<String>,
}

impl<'a> Page<'a> {
    pub fn new(document: &'a Html) -> Self {
        Page {
            document,
            blocks: blocks::classify_nodes(document),
            lines: blocks::rendered_lines(document),
        }
    }
}

/// One extraction heuristic. Returns an empty list when it has nothing for
/// the category.
pub trait Strategy: Sync {
    fn name(&self) -> &'static str;
    fn try_extract(&self, page: &Page, category: Category) -> Vec<String>;
}

/// Direct strategies in priority order.
pub const CASCADE: &[&dyn Strategy] = &[
    &headings::HeadingScan,
    &selectors::SelectorScan,
    &dates::DatePatternScan,
];

/// Per category, the first strategy yielding anything wins outright.
pub fn run_cascade(page: &Page, strategies: &[&dyn Strategy]) -> CategoryFields {
    let mut fields = CategoryFields::default();
    for category in Category::ALL {
        for strategy in strategies {
            let items = strategy.try_extract(page, category);
            if !items.is_empty() {
                debug!(
                    category = category.label(),
                    strategy = strategy.name(),
                    items = items.len(),
                    "strategy matched"
                );
                *fields.get_mut(category) = items;
                break;
            }
        }
    }
    fields
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Append unless already present.
pub(crate) fn push_unique(items: &mut Vec<String>, item: &str) -> bool {
    if item.is_empty() || items.iter().any(|i| i == item) {
        return false;
    }
    items.push(item.to_string());
    true
}
