use std::sync::LazyLock;

use regex::Regex;

use super::{contains_any, push_unique, Page, Strategy};
use crate::parser::blocks::Block;
use crate::record::Category;

const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

// "November 1", "Nov. 15th", "1 November"
static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:{m})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{m}))\b",
        m = MONTHS
    ))
    .unwrap()
});

const DEADLINE_WORDS: &[&str] = &[
    "deadline",
    "due",
    "apply by",
    "submit",
    "closes",
    "closing date",
    "application",
];

const MAX_ITEMS: usize = 5;

pub fn has_month_day(text: &str) -> bool {
    MONTH_DAY_RE.is_match(text)
}

/// Paragraph-level blocks pairing a calendar date with deadline wording.
/// Only applies to deadlines.
pub struct DatePatternScan;

impl Strategy for DatePatternScan {
    fn name(&self) -> &'static str {
        "date-pattern"
    }

    fn try_extract(&self, page: &Page, category: Category) -> Vec<String> {
        if category != Category::Deadlines {
            return Vec::new();
        }
        let mut items = Vec::new();
        for block in &page.blocks {
            let Block::Item(text) = block else {
                continue;
            };
            if has_month_day(text) && contains_any(&text.to_lowercase(), DEADLINE_WORDS) {
                push_unique(&mut items, text);
                if items.len() >= MAX_ITEMS {
                    break;
                }
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn month_day_forms() {
        assert!(has_month_day("Applications due November 1"));
        assert!(has_month_day("due Nov. 15th"));
        assert!(has_month_day("closes 1 March 2025"));
        assert!(!has_month_day("May we help you?"));
        assert!(!has_month_day("Over 300 programs"));
    }

    #[test]
    fn requires_both_date_and_keyword() {
        let doc = Html::parse_document(
            "<p>The deadline to apply is January 15.</p>\
             <p>Our campus opened on March 3, 1890.</p>\
             <p>Deadline information is coming soon.</p>",
        );
        let page = Page::new(&doc);
        assert_eq!(
            DatePatternScan.try_extract(&page, Category::Deadlines),
            vec!["The deadline to apply is January 15."]
        );
        assert!(DatePatternScan.try_extract(&page, Category::Courses).is_empty());
    }
}
