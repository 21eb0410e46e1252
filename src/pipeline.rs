use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::fetcher::{FetchOutcome, Fetcher};
use crate::merge::merge;
use crate::parser::{self, Extraction};
use crate::record::{Category, ExtractionRecord};
use crate::settings::Settings;
use crate::target::{prepare_targets, Target};

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub skipped: usize,
}

pub struct RunOutput {
    pub records: Vec<ExtractionRecord>,
    pub stats: RunStats,
}

/// Drives fetch -> extract -> merge over an ordered target list.
pub struct Pipeline {
    fetcher: Arc<Fetcher>,
    settings: Arc<Settings>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = Fetcher::new(&settings)?;
        Ok(Pipeline {
            fetcher: Arc::new(fetcher),
            settings: Arc::new(settings),
            show_progress: true,
        })
    }

    #[cfg(test)]
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Process targets in batches of `batch_size`, pausing `rate_limit`
    /// between batches. Output order equals input order regardless of which
    /// task finishes first; targets without a URL are skipped.
    pub async fn run(&self, targets: Vec<Target>) -> RunOutput {
        let given = targets.len();
        let targets = prepare_targets(targets);
        let total = targets.len();
        let batch_size = self.settings.batch_size.max(1);

        let mut stats = RunStats {
            total,
            skipped: given - total,
            ..Default::default()
        };
        let mut slots: Vec<Option<ExtractionRecord>> = vec![None; total];
        let pb = self.progress_bar(total);
        let started = Instant::now();

        for (batch_no, batch) in targets.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                pace(&self.settings).await;
            }
            let offset = batch_no * batch_size;
            info!("Processing batch {} with {} targets", batch_no + 1, batch.len());

            let (tx, mut rx) = mpsc::channel::<(usize, ExtractionRecord)>(batch.len());
            for (i, target) in batch.iter().cloned().enumerate() {
                let fetcher = Arc::clone(&self.fetcher);
                let settings = Arc::clone(&self.settings);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let record = process_target(&fetcher, &settings, &target).await;
                    let _ = tx.send((offset + i, record)).await;
                });
            }
            // rx closes once every task has reported or died
            drop(tx);

            while let Some((idx, record)) = rx.recv().await {
                if record.error.is_some() {
                    stats.errors += 1;
                } else {
                    stats.ok += 1;
                }
                slots[idx] = Some(record);
                pb.inc(1);
            }

            for (i, target) in batch.iter().enumerate() {
                let slot = &mut slots[offset + i];
                if slot.is_none() {
                    error!("Task for {} ended without a result", target.name);
                    *slot = Some(ExtractionRecord::failed(
                        &target.name,
                        &target.url,
                        "processing task aborted",
                    ));
                    stats.errors += 1;
                    pb.inc(1);
                }
            }
        }

        pb.finish_and_clear();
        info!(
            "Processed {} targets ({} ok, {} errors, {} skipped) in {:.1}s",
            stats.total,
            stats.ok,
            stats.errors,
            stats.skipped,
            started.elapsed().as_secs_f64()
        );

        RunOutput {
            records: slots.into_iter().flatten().collect(),
            stats,
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// Fetch, extract, follow secondary links if the page gave nothing, then
/// fall back to the line scan for whatever is still empty. Never fails: any
/// fetch failure becomes a sentinel record carrying the reason.
pub async fn process_target(
    fetcher: &Fetcher,
    settings: &Settings,
    target: &Target,
) -> ExtractionRecord {
    info!("Processing {} at {}", target.name, target.url);

    let report = fetcher.fetch(&target.url).await;
    let body = match report.outcome {
        FetchOutcome::Success { body } => body,
        other => {
            let reason = other.failure_reason().unwrap_or("fetch failed").to_string();
            let waited: Duration = report.backoffs.iter().sum();
            warn!(
                "Giving up on {} after {} attempts ({:.1}s in backoff): {}",
                target.name,
                report.attempts,
                waited.as_secs_f64(),
                reason
            );
            return ExtractionRecord::failed(&target.name, &target.url, reason);
        }
    };
    let base = match Url::parse(&target.url) {
        Ok(u) => u,
        Err(e) => return ExtractionRecord::failed(&target.name, &target.url, e.to_string()),
    };

    let Extraction {
        mut fields,
        secondary_links,
        fallback,
    } = parser::extract_html(&body, &base);

    if !secondary_links.is_empty() {
        info!(
            "No direct matches for {}, following up to {} of {} links",
            target.name,
            settings.max_secondary_links,
            secondary_links.len()
        );
    }
    for link in secondary_links.iter().take(settings.max_secondary_links) {
        pace(settings).await;
        let report = fetcher.fetch(&link.url).await;
        let (body, link_url) = match (report.outcome, Url::parse(&link.url)) {
            (FetchOutcome::Success { body }, Ok(u)) => (body, u),
            (outcome, _) => {
                warn!(
                    "Secondary page {} for {} failed: {}",
                    link.url,
                    target.name,
                    outcome.failure_reason().unwrap_or("unparseable URL")
                );
                continue;
            }
        };
        let secondary = parser::extract_html(&body, &link_url);
        fields = merge(&fields, &secondary.fields);
        info!("Merged \"{}\" ({}) into {}", link.anchor_text, link.url, target.name);
    }

    fields.fill_empty_from(&fallback);
    ExtractionRecord::new(&target.name, &target.url, fields)
}

async fn pace(settings: &Settings) {
    let delay = settings.rate_limit();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// How many records carry real content per category.
pub struct Coverage {
    pub total: usize,
    pub errors: usize,
    pub found: Vec<(Category, usize)>,
}

impl Coverage {
    pub fn from_records(records: &[ExtractionRecord]) -> Self {
        let found = Category::ALL
            .iter()
            .map(|c| (*c, records.iter().filter(|r| r.fields.is_found(*c)).count()))
            .collect();
        Coverage {
            total: records.len(),
            errors: records.iter().filter(|r| r.error.is_some()).count(),
            found,
        }
    }

    pub fn print(&self) {
        println!("Targets processed: {} ({} with errors)", self.total, self.errors);
        for (category, n) in &self.found {
            let pct = if self.total == 0 {
                0.0
            } else {
                *n as f64 * 100.0 / self.total as f64
            };
            println!(
                "  {:<20} {:>4}/{:<4} ({:.1}%)",
                category.label(),
                n,
                self.total,
                pct
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SENTINEL;

    fn settings(batch_size: usize) -> Settings {
        Settings {
            batch_size,
            rate_limit_secs: 0.0,
            backoff_unit_ms: 1,
            timeout_secs: 5,
            ..Settings::default()
        }
    }

    fn sentinel() -> Vec<String> {
        vec![SENTINEL.to_string()]
    }

    const HUB: &str = r#"<html><body><h1>Welcome</h1>
        <nav><a href="/admissions">Admissions</a><a href="/programs">Programs</a>
        <a href="/apply">Apply online</a></nav></body></html>"#;

    const ADMISSIONS: &str = r#"<html><body>
        <h2>Admission Requirements</h2>
        <p>Two letters of recommendation from teachers</p>
        <p>Official high school transcript</p>
        <h2>Application Deadlines</h2>
        <p>Regular decision applications close January 5</p>
        </body></html>"#;

    const PROGRAMS: &str = r#"<html><body>
        <h2>Degree Programs</h2>
        <ul><li>Bachelor of Engineering in Robotics</li><li>Bachelor of Fine Arts in Painting</li></ul>
        <h2>Admission Requirements</h2>
        <p>Official high school transcript</p>
        <p>Portfolio of recent creative work</p>
        </body></html>"#;

    #[tokio::test]
    async fn follows_two_secondary_links_and_merges() {
        let mut server = mockito::Server::new_async().await;
        let _hub = server.mock("GET", "/").with_status(200).with_body(HUB).create_async().await;
        let admissions = server
            .mock("GET", "/admissions")
            .with_status(200)
            .with_body(ADMISSIONS)
            .expect(1)
            .create_async()
            .await;
        let programs = server
            .mock("GET", "/programs")
            .with_status(200)
            .with_body(PROGRAMS)
            .expect(1)
            .create_async()
            .await;
        let apply = server.mock("GET", "/apply").expect(0).create_async().await;

        let pipeline = Pipeline::new(settings(1)).unwrap().quiet();
        let out = pipeline
            .run(vec![Target::new("Hub U", &format!("{}/", server.url()))])
            .await;

        let rec = &out.records[0];
        assert!(rec.error.is_none());
        assert_eq!(
            rec.fields.courses,
            vec!["Bachelor of Engineering in Robotics", "Bachelor of Fine Arts in Painting"]
        );
        assert_eq!(
            rec.fields.admissions_requirements,
            vec![
                "Two letters of recommendation from teachers",
                "Official high school transcript",
                "Portfolio of recent creative work",
            ]
        );
        assert_eq!(
            rec.fields.application_deadlines,
            vec!["Regular decision applications close January 5"]
        );
        assert_eq!(rec.fields.early_admission, sentinel());
        admissions.assert_async().await;
        programs.assert_async().await;
        apply.assert_async().await;
    }

    #[tokio::test]
    async fn failed_secondary_page_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _hub = server.mock("GET", "/").with_status(200).with_body(HUB).create_async().await;
        let missing = server
            .mock("GET", "/admissions")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let programs = server
            .mock("GET", "/programs")
            .with_status(200)
            .with_body(PROGRAMS)
            .expect(1)
            .create_async()
            .await;
        let apply = server.mock("GET", "/apply").expect(0).create_async().await;

        let pipeline = Pipeline::new(settings(1)).unwrap().quiet();
        let out = pipeline
            .run(vec![Target::new("Hub U", &format!("{}/", server.url()))])
            .await;

        let rec = &out.records[0];
        assert!(rec.error.is_none());
        assert_eq!(
            rec.fields.courses,
            vec!["Bachelor of Engineering in Robotics", "Bachelor of Fine Arts in Painting"]
        );
        assert_eq!(
            rec.fields.admissions_requirements,
            vec!["Official high school transcript", "Portfolio of recent creative work"]
        );
        assert_eq!(out.stats, RunStats { total: 1, ok: 1, errors: 0, skipped: 0 });
        missing.assert_async().await;
        programs.assert_async().await;
        apply.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_degrade_record_and_run_continues() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/down")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/up")
            .with_status(200)
            .with_body(ADMISSIONS)
            .create_async()
            .await;

        let pipeline = Pipeline::new(settings(1)).unwrap().quiet();
        let out = pipeline
            .run(vec![
                Target::new("Down U", &format!("{}/down", server.url())),
                Target::new("Up U", &format!("{}/up", server.url())),
            ])
            .await;

        assert_eq!(out.records.len(), 2);
        let down = &out.records[0];
        assert_eq!(down.name, "Down U");
        assert!(down.error.as_deref().unwrap().contains("exhausted retries"));
        for c in Category::ALL {
            assert_eq!(down.fields.get(c), &sentinel());
        }
        assert_eq!(out.records[1].name, "Up U");
        assert!(out.records[1].error.is_none());
        assert_eq!(out.stats, RunStats { total: 2, ok: 1, errors: 1, skipped: 0 });
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn output_order_matches_input_under_concurrency() {
        let mut server = mockito::Server::new_async().await;
        let _a = server.mock("GET", "/a").with_status(200).with_body(PROGRAMS).create_async().await;
        let _b = server.mock("GET", "/b").with_status(404).create_async().await;
        let _c = server.mock("GET", "/c").with_status(200).with_body(ADMISSIONS).create_async().await;

        let targets: Vec<Target> = ["a", "b", "c", "a", "b"]
            .iter()
            .enumerate()
            .map(|(i, p)| Target::new(&format!("T{}", i), &format!("{}/{}", server.url(), p)))
            .collect();

        let pipeline = Pipeline::new(settings(3)).unwrap().quiet();
        let out = pipeline.run(targets).await;

        let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["T0", "T1", "T2", "T3", "T4"]);
        assert!(out.records[1].error.as_deref() == Some("HTTP 404"));
        assert!(out.records[2].error.is_none());
    }

    #[tokio::test]
    async fn scheme_is_added_and_blank_urls_skipped() {
        let pipeline = Pipeline::new(settings(2)).unwrap().quiet();
        let out = pipeline
            .run(vec![Target::new("Nowhere", ""), Target::new("Local", "localhost:1")])
            .await;

        assert_eq!(out.stats.skipped, 1);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].url, "https://localhost:1");
        assert!(out.records[0].error.is_some());
    }

    #[test]
    fn coverage_counts_non_sentinel() {
        let found = crate::record::CategoryFields {
            courses: vec!["Law".into()],
            ..Default::default()
        };
        let records = vec![
            ExtractionRecord::new("A", "https://a.edu", found),
            ExtractionRecord::failed("B", "https://b.edu", "HTTP 404"),
        ];
        let cov = Coverage::from_records(&records);
        assert_eq!(cov.total, 2);
        assert_eq!(cov.errors, 1);
        assert_eq!(cov.found[0], (Category::Courses, 1));
        assert_eq!(cov.found[2], (Category::Requirements, 0));
    }
}
