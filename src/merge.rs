use std::collections::HashSet;

use crate::record::{is_placeholder, is_sentinel, normalize_text, Category, CategoryFields};

/// Combine a primary page's fields with a secondary page's, per category.
pub fn merge(primary: &CategoryFields, secondary: &CategoryFields) -> CategoryFields {
    let mut merged = CategoryFields::default();
    for category in Category::ALL {
        *merged.get_mut(category) = merge_items(primary.get(category), secondary.get(category));
    }
    merged
}

/// Primary items first, then secondary, deduplicated on normalised text in
/// first-seen order. Placeholder tokens are dropped wherever they occur.
/// Two sentinel inputs leave the primary list as it was.
pub fn merge_items(primary: &[String], secondary: &[String]) -> Vec<String> {
    match (is_sentinel(primary), is_sentinel(secondary)) {
        (true, true) => primary.to_vec(),
        (true, false) => dedup(secondary.iter()),
        (false, true) => dedup(primary.iter()),
        (false, false) => dedup(primary.iter().chain(secondary)),
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|s| !is_placeholder(s))
        .map(|s| normalize_text(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
