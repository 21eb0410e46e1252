pub mod blocks;
pub mod extract;

use scraper::Html;
use url::Url;

use crate::record::CategoryFields;
use extract::lines::LineScan;
use extract::links::{self, SecondaryLink};
use extract::Page;

/// Everything one document yields. `fallback` holds the last-resort line
/// scan, applied by the caller only to categories still empty after merging.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: CategoryFields,
    pub secondary_links: Vec<SecondaryLink>,
    pub fallback: CategoryFields,
}

/// Parse and extract. The parsed tree never outlives this call.
pub fn extract_html(html: &str, source_url: &Url) -> Extraction {
    let document = Html::parse_document(html);
    extract_document(&document, source_url)
}

/// Direct strategies per category; when all of them come up empty, the
/// page's admissions/course links are offered for following.
pub fn extract_document(document: &Html, source_url: &Url) -> Extraction {
    let page = Page::new(document);
    let fields = extract::run_cascade(&page, extract::CASCADE);
    let secondary_links = if fields.is_empty() {
        links::discover(&page.blocks, source_url)
    } else {
        Vec::new()
    };
    let fallback = extract::run_cascade(&page, &[&LineScan]);

    Extraction {
        fields,
        secondary_links,
        fallback,
    }
}
