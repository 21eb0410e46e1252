use serde::{Deserialize, Serialize};

/// Placeholder for a category with no located content.
pub const SENTINEL: &str = "Not found";

/// Tokens treated as "no content" wherever they appear in a list.
const PLACEHOLDERS: &[&str] = &[SENTINEL, "", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Courses,
    CourseDescriptions,
    Requirements,
    Deadlines,
    EarlyAdmission,
    RegularAdmission,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Courses,
        Category::CourseDescriptions,
        Category::Requirements,
        Category::Deadlines,
        Category::EarlyAdmission,
        Category::RegularAdmission,
    ];

    /// Course descriptions are supplementary: they never decide whether a
    /// page counts as empty.
    pub const PRIMARY: [Category; 5] = [
        Category::Courses,
        Category::Requirements,
        Category::Deadlines,
        Category::EarlyAdmission,
        Category::RegularAdmission,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Courses => "courses",
            Category::CourseDescriptions => "course descriptions",
            Category::Requirements => "requirements",
            Category::Deadlines => "deadlines",
            Category::EarlyAdmission => "early admission",
            Category::RegularAdmission => "regular admission",
        }
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_placeholder(s: &str) -> bool {
    let t = normalize_text(s);
    PLACEHOLDERS.contains(&t.as_str())
}

/// A list holding nothing but placeholders stands for "no data".
pub fn is_sentinel(items: &[String]) -> bool {
    items.iter().all(|s| is_placeholder(s))
}

/// Per-category item lists. Empty lists mean "nothing found yet"; the
/// sentinel is only materialised by [`CategoryFields::finalized`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFields {
    pub courses: Vec<String>,
    pub course_descriptions: Vec<String>,
    pub admissions_requirements: Vec<String>,
    pub application_deadlines: Vec<String>,
    pub early_admission: Vec<String>,
    pub regular_admission: Vec<String>,
}

impl CategoryFields {
    pub fn get(&self, category: Category) -> &Vec<String> {
        match category {
            Category::Courses => &self.courses,
            Category::CourseDescriptions => &self.course_descriptions,
            Category::Requirements => &self.admissions_requirements,
            Category::Deadlines => &self.application_deadlines,
            Category::EarlyAdmission => &self.early_admission,
            Category::RegularAdmission => &self.regular_admission,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Courses => &mut self.courses,
            Category::CourseDescriptions => &mut self.course_descriptions,
            Category::Requirements => &mut self.admissions_requirements,
            Category::Deadlines => &mut self.application_deadlines,
            Category::EarlyAdmission => &mut self.early_admission,
            Category::RegularAdmission => &mut self.regular_admission,
        }
    }

    pub fn is_found(&self, category: Category) -> bool {
        !is_sentinel(self.get(category))
    }

    /// True when none of the primary categories holds real content.
    pub fn is_empty(&self) -> bool {
        Category::PRIMARY.iter().all(|c| !self.is_found(*c))
    }

    /// Fill categories that are still empty from `fallback`, wholesale.
    /// A category that already has content is never mixed with fallback items.
    pub fn fill_empty_from(&mut self, fallback: &CategoryFields) {
        for category in Category::ALL {
            if !self.is_found(category) && fallback.is_found(category) {
                *self.get_mut(category) = fallback.get(category).clone();
            }
        }
    }

    /// Every category non-empty: content, or exactly `["Not found"]`.
    pub fn finalized(mut self) -> Self {
        for category in Category::ALL {
            let items = self.get_mut(category);
            items.retain(|s| !is_placeholder(s));
            if items.is_empty() {
                items.push(SENTINEL.to_string());
            }
        }
        self
    }
}

/// One target's final output row. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub fields: CategoryFields,
    pub scraped_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionRecord {
    pub fn new(name: &str, url: &str, fields: CategoryFields) -> Self {
        ExtractionRecord {
            name: name.to_string(),
            url: url.to_string(),
            fields: fields.finalized(),
            scraped_at: timestamp(),
            error: None,
        }
    }

    /// All categories sentinel, with the failure reason attached.
    pub fn failed(name: &str, url: &str, error: impl Into<String>) -> Self {
        ExtractionRecord {
            error: Some(error.into()),
            ..ExtractionRecord::new(name, url, CategoryFields::default())
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  Fall \n\t 2025   intake "), "Fall 2025 intake");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn placeholders_detected() {
        assert!(is_placeholder("Not found"));
        assert!(is_placeholder("  None "));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("None of the above"));
        assert!(is_sentinel(&[]));
        assert!(is_sentinel(&["Not found".to_string()]));
    }

    #[test]
    fn finalized_never_leaves_empty_lists() {
        let fields = CategoryFields {
            courses: vec!["Biology".into(), "None".into()],
            ..Default::default()
        }
        .finalized();
        assert_eq!(fields.courses, vec!["Biology"]);
        for c in Category::ALL {
            assert!(!fields.get(c).is_empty(), "{} empty", c.label());
        }
        assert_eq!(fields.application_deadlines, vec![SENTINEL]);
    }

    #[test]
    fn fill_empty_does_not_mix() {
        let mut fields = CategoryFields {
            courses: vec!["From headings".into()],
            ..Default::default()
        };
        let fallback = CategoryFields {
            courses: vec!["From lines".into()],
            application_deadlines: vec!["Apply by January 1".into()],
            ..Default::default()
        };
        fields.fill_empty_from(&fallback);
        assert_eq!(fields.courses, vec!["From headings"]);
        assert_eq!(fields.application_deadlines, vec!["Apply by January 1"]);
    }

    #[test]
    fn failed_record_serializes_all_fields() {
        let rec = ExtractionRecord::failed("Example U", "https://example.edu", "HTTP 500");
        let json = serde_json::to_value(&rec).unwrap();
        for key in [
            "courses",
            "courseDescriptions",
            "admissionsRequirements",
            "applicationDeadlines",
            "earlyAdmission",
            "regularAdmission",
        ] {
            assert_eq!(json[key], serde_json::json!(["Not found"]), "{}", key);
        }
        assert_eq!(json["error"], "HTTP 500");
        assert!(json["scrapedAt"].is_string());
    }

    #[test]
    fn ok_record_omits_error() {
        let rec = ExtractionRecord::new("A", "https://a.edu", CategoryFields::default());
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("error").is_none());
    }
}
