use super::{contains_any, push_unique, Page, Strategy};
use crate::parser::blocks::Block;
use crate::record::Category;

/// Items shorter than this (after whitespace normalisation) are noise.
const MIN_ITEM_CHARS: usize = 15;

/// Finds headings naming a category and collects the text that follows them.
pub struct HeadingScan;

fn keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Courses => &["course", "program", "degree", "major", "academic"],
        Category::CourseDescriptions => &[
            "description",
            "overview",
            "curriculum",
            "about the program",
            "what you will study",
        ],
        Category::Requirements => &[
            "requirement",
            "admission",
            "prerequisite",
            "qualification",
            "eligibility",
            "criteria",
        ],
        Category::Deadlines => &[
            "deadline",
            "important date",
            "application date",
            "due date",
            "submission",
            "calendar",
        ],
        Category::EarlyAdmission => &["early action", "early decision", "early admission"],
        Category::RegularAdmission => &["regular decision", "regular admission"],
    }
}

fn cap(category: Category) -> usize {
    match category {
        Category::Deadlines | Category::EarlyAdmission | Category::RegularAdmission => 3,
        _ => 5,
    }
}

impl Strategy for HeadingScan {
    fn name(&self) -> &'static str {
        "heading-keyword"
    }

    fn try_extract(&self, page: &Page, category: Category) -> Vec<String> {
        let kws = keywords(category);
        let cap = cap(category);
        let mut items = Vec::new();

        for (i, block) in page.blocks.iter().enumerate() {
            let Block::Heading { text, .. } = block else {
                continue;
            };
            if !contains_any(&text.to_lowercase(), kws) {
                continue;
            }

            let mut collected = 0;
            for next in &page.blocks[i + 1..] {
                match next {
                    Block::Heading { .. } if collected > 0 => break,
                    Block::Item(t) if t.chars().count() >= MIN_ITEM_CHARS => {
                        if push_unique(&mut items, t) {
                            collected += 1;
                        }
                    }
                    _ => {}
                }
                if items.len() >= cap {
                    return items;
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

    fn scan(html: &str, category: Category) -> Vec<String> {
        let doc = Html::parse_document(html);
        HeadingScan.try_extract(&Page::new(&doc), category)
    }

    #[test]
    fn collects_until_next_heading() {
        let html = "<h2>Our Programs</h2>\
                    <ul><li>Bachelor of Science in Biology</li><li>Bachelor of Arts in History</li></ul>\
                    <h2>Campus Life</h2><p>Dormitories and dining halls for everyone</p>";
        assert_eq!(
            scan(html, Category::Courses),
            vec!["Bachelor of Science in Biology", "Bachelor of Arts in History"]
        );
    }

    #[test]
    fn short_items_discarded() {
        let html = "<h2>Majors</h2><ul><li>Art</li><li>Mechanical Engineering BEng</li></ul>";
        assert_eq!(scan(html, Category::Courses), vec!["Mechanical Engineering BEng"]);
    }

    #[test]
    fn empty_subheading_does_not_stop_walk() {
        let html = "<h2>Admission Requirements</h2><h3>First-year</h3>\
                    <p>High school diploma or equivalent required</p><h3>Transfer</h3>\
                    <p>Ignored because walk already stopped here</p>";
        assert_eq!(
            scan(html, Category::Requirements),
            vec!["High school diploma or equivalent required"]
        );
    }

    #[test]
    fn accordion_items_keep_their_own_section() {
        let html = "<ul><li><h3>Admission Requirements</h3>\
                    <p>Official transcripts from all schools attended</p></li>\
                    <li><h3>Campus Life</h3>\
                    <p>Residence halls house every first-year student</p></li></ul>";
        assert_eq!(
            scan(html, Category::Requirements),
            vec!["Official transcripts from all schools attended"]
        );
    }

    #[test]
    fn deadline_cap_is_three() {
        let html = "<h2>Application Deadlines</h2>\
                    <p>Early action closes November 1</p><p>Early decision closes November 15</p>\
                    <p>Regular decision closes January 5</p><p>Transfer applications close March 1</p>";
        assert_eq!(scan(html, Category::Deadlines).len(), 3);
    }

    #[test]
    fn no_matching_heading_yields_nothing() {
        let html = "<h2>Welcome</h2><p>A long paragraph about the weather today</p>";
        assert!(scan(html, Category::Courses).is_empty());
    }
}
