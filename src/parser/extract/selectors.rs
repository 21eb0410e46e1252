use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{push_unique, Page, Strategy};
use crate::record::{is_placeholder, normalize_text, Category};

const MAX_ITEMS: usize = 10;

static COURSES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".programs li, ul.course-list li, .course-list li, .programs-list li, .program-list li, \
         .majors li, .majors-list li, .degrees li, .degrees-list li, .courses li, \
         .academic-programs li, .academic-departments li, #programs li, .study-areas li",
    )
    .unwrap()
});

static DESCRIPTIONS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".program-description, .course-description, .major-description, .degree-description, \
         .program-info p, .major-info p, .concentration-info p, .curriculum p",
    )
    .unwrap()
});

static REQUIREMENTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".requirements li, ul.requirements li, .admission-requirements li, \
         #admissions-requirements li, .application-requirements li, .eligibility li, \
         .criteria li, .prerequisites li, .qualifications li, .entry-requirements li",
    )
    .unwrap()
});

static DEADLINES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".deadlines li, .dates li, .calendar li, .important-dates li, .key-dates li, \
         .due-dates li, .timeline li, .application-timeline li, #application-deadlines li, \
         table.deadlines td",
    )
    .unwrap()
});

static EARLY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".early-action li, .early-decision li, #early-admission li, \
         .early-action p, .early-decision p, #early-admission p",
    )
    .unwrap()
});

static REGULAR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".regular-decision li, .regular-admission li, #regular-admission li, \
         .regular-decision p, .regular-admission p, #regular-admission p",
    )
    .unwrap()
});

fn selector(category: Category) -> &'static Selector {
    match category {
        Category::Courses => &COURSES,
        Category::CourseDescriptions => &DESCRIPTIONS,
        Category::Requirements => &REQUIREMENTS,
        Category::Deadlines => &DEADLINES,
        Category::EarlyAdmission => &EARLY,
        Category::RegularAdmission => &REGULAR,
    }
}

/// Common class/id naming conventions for each category.
pub struct SelectorScan;

impl Strategy for SelectorScan {
    fn name(&self) -> &'static str {
        "curated-selector"
    }

    fn try_extract(&self, page: &Page, category: Category) -> Vec<String> {
        let mut items = Vec::new();
        let sel = selector(category);
        for el in page.document.select(sel) {
            let text = own_text(el, sel);
            if is_placeholder(&text) {
                continue;
            }
            push_unique(&mut items, &text);
            if items.len() >= MAX_ITEMS {
                break;
            }
        }
        items
    }
}

/// Text of `el` minus any nested elements the same selector matches, so a
/// parent list item does not repeat its children.
fn own_text(el: ElementRef, sel: &Selector) -> String {
    fn collect(el: ElementRef, sel: &Selector, out: &mut Vec<String>) {
        for child in el.children() {
            if let Some(text) = child.value().as_text() {
                out.push(text.to_string());
            } else if let Some(c) = ElementRef::wrap(child) {
                if !sel.matches(&c) {
                    collect(c, sel, out);
                }
            }
        }
    }

    let mut parts = Vec::new();
    collect(el, sel, &mut parts);
    normalize_text(&parts.join(" "))
}
