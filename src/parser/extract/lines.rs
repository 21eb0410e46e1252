use super::{contains_any, push_unique, Page, Strategy};
use crate::record::Category;

const DESCRIPTION_MIN_CHARS: usize = 80;

struct LineRule {
    keywords: &'static [&'static str],
    cap: usize,
    min_chars: usize,
}

fn rule(category: Category) -> LineRule {
    match category {
        Category::Courses => LineRule {
            keywords: &[
                "degree",
                "course",
                "program",
                "major",
                "bachelor",
                "master",
                "phd",
                "concentration",
                "field of study",
            ],
            cap: 10,
            min_chars: 0,
        },
        Category::CourseDescriptions => LineRule {
            keywords: &["program", "study", "academic", "field", "course", "concentration"],
            cap: 10,
            min_chars: DESCRIPTION_MIN_CHARS,
        },
        Category::Requirements => LineRule {
            keywords: &[
                "requirement",
                "admission",
                "prerequisite",
                "qualify",
                "eligibility",
                "gpa",
                "test score",
                "application process",
            ],
            cap: 10,
            min_chars: 0,
        },
        Category::Deadlines => LineRule {
            keywords: &[
                "deadline",
                "date",
                "application period",
                "apply by",
                "due by",
                "submit by",
                "timeline",
            ],
            cap: 10,
            min_chars: 0,
        },
        Category::EarlyAdmission => LineRule {
            keywords: &[
                "early action",
                "early decision",
                "early admission",
                "november",
                "december",
            ],
            cap: 5,
            min_chars: 0,
        },
        Category::RegularAdmission => LineRule {
            keywords: &[
                "regular decision",
                "regular admission",
                "january",
                "february",
                "march",
                "april",
            ],
            cap: 5,
            min_chars: 0,
        },
    }
}

/// Last resort: keyword match over the page's rendered text lines.
/// Its output only ever replaces an empty category, never extends one.
pub struct LineScan;

impl Strategy for LineScan {
    fn name(&self) -> &'static str {
        "line-scan"
    }

    fn try_extract(&self, page: &Page, category: Category) -> Vec<String> {
        let rule = rule(category);
        let mut items = Vec::new();
        for line in &page.lines {
            if line.chars().count() <= rule.min_chars && rule.min_chars > 0 {
                continue;
            }
            if contains_any(&line.to_lowercase(), rule.keywords) {
                push_unique(&mut items, line);
                if items.len() >= rule.cap {
                    break;
                }
            }
        }
        items
    }
}
