mod db;
mod error;
mod fetcher;
mod merge;
mod output;
mod parser;
mod pipeline;
mod record;
mod settings;
mod target;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use url::Url;

use pipeline::{Coverage, Pipeline};
use record::{Category, ExtractionRecord};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "admissions_scraper",
    about = "University admissions data scraper"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every target in the input list and store the results
    Run {
        /// JSON array of {"name", "url"} objects
        #[arg(short, long)]
        input: PathBuf,
        /// Output JSON path (default from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only process the first N targets
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Targets fetched concurrently per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Seconds to wait between batches and secondary fetches
        #[arg(long)]
        rate_limit: Option<f64>,
    },
    /// Extract from saved HTML files without touching the network
    Extract {
        files: Vec<PathBuf>,
        /// URL the pages were saved from
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Coverage summary of the latest stored run
    Stats,
    /// Records overview table for the latest stored run
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Only show targets that failed
        #[arg(long)]
        errors_only: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            limit,
            batch_size,
            rate_limit,
        } => {
            if let Some(b) = batch_size {
                settings.batch_size = b;
            }
            if let Some(r) = rate_limit {
                settings.rate_limit_secs = r;
            }
            if let Some(o) = output {
                settings.output_path = o;
            }
            let settings = settings.sanitized();

            let mut targets = target::load_targets(&input)?;
            if let Some(n) = limit {
                targets.truncate(n);
            }
            if targets.is_empty() {
                println!("No targets in {}.", input.display());
                return Ok(());
            }

            let started_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            println!(
                "Scraping {} targets (batch size {}, {:.1}s between batches)...",
                targets.len(),
                settings.batch_size,
                settings.rate_limit_secs
            );
            let out = Pipeline::new(settings.clone())?.run(targets).await;

            let saved = output::save_records(
                &out.records,
                &settings.output_path,
                &settings.fallback_output_path,
            );
            match &saved {
                Ok(path) => println!("Saved {} records to {}", out.records.len(), path.display()),
                Err(e) => eprintln!("{}", e),
            }

            match store_run(&settings.db_path, &started_at, &out) {
                Ok(run_id) => println!("Stored as run {} in {}", run_id, settings.db_path.display()),
                Err(e) => tracing::error!("Could not store run in {:?}: {:#}", settings.db_path, e),
            }

            println!("\n--- Scraping Summary ---");
            if out.stats.skipped > 0 {
                println!("Skipped (no URL): {}", out.stats.skipped);
            }
            Coverage::from_records(&out.records).print();

            saved.map(|_| ()).map_err(anyhow::Error::from)
        }
        Commands::Extract { files, base_url } => {
            if files.is_empty() {
                println!("No files given.");
                return Ok(());
            }
            let base = base_url.as_deref().map(Url::parse).transpose()?;
            let records = files
                .par_iter()
                .map(|path| extract_file(path, base.as_ref()))
                .collect::<anyhow::Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(run) = db::latest_run(&conn)? else {
                println!("No runs stored yet. Use 'run' first.");
                return Ok(());
            };
            println!("Run:       {} ({})", run.run_id, run.started_at);
            println!("Targets:   {}", run.targets);
            println!("OK:        {}", run.ok);
            println!("Errors:    {}", run.errors);
            println!("Skipped:   {}", run.skipped);
            println!();
            let records = db::fetch_records(&conn, run.run_id, false, None)?;
            Coverage::from_records(&records).print();
            Ok(())
        }
        Commands::Overview { limit, errors_only } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(run) = db::latest_run(&conn)? else {
                println!("No runs stored yet. Use 'run' first.");
                return Ok(());
            };
            let rows = db::fetch_records(&conn, run.run_id, errors_only, Some(limit))?;
            if rows.is_empty() {
                println!("No records found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:>4} | {:>4} | {:>4} | {:>5} | {:>5} | {:>7} | {:<24}",
                "#", "Name", "Crs", "Desc", "Reqs", "Dates", "Early", "Regular", "Error"
            );
            println!("{}", "-".repeat(110));

            for (i, r) in rows.iter().enumerate() {
                let counts: Vec<usize> = Category::ALL.iter().map(|c| found_count(r, *c)).collect();
                println!(
                    "{:>3} | {:<28} | {:>4} | {:>4} | {:>4} | {:>5} | {:>5} | {:>7} | {:<24}",
                    i + 1,
                    truncate(&r.name, 28),
                    counts[0],
                    counts[1],
                    counts[2],
                    counts[3],
                    counts[4],
                    counts[5],
                    truncate(r.error.as_deref().unwrap_or("-"), 24)
                );
            }

            println!("\n{} records | run {} ({})", rows.len(), run.run_id, run.started_at);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn store_run(db_path: &Path, started_at: &str, out: &pipeline::RunOutput) -> anyhow::Result<i64> {
    let conn = db::connect(db_path)?;
    db::init_schema(&conn)?;
    db::save_run(&conn, started_at, &out.stats, &out.records)
}

/// Offline extraction of one saved page; links are reported nowhere since
/// nothing is fetched.
fn extract_file(path: &Path, base: Option<&Url>) -> anyhow::Result<ExtractionRecord> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let url = match base {
        Some(u) => u.clone(),
        None => {
            let abs = std::fs::canonicalize(path)?;
            Url::from_file_path(&abs)
                .map_err(|_| anyhow!("cannot build a file URL for {}", abs.display()))?
        }
    };

    let extraction = parser::extract_html(&html, &url);
    let mut fields = extraction.fields;
    fields.fill_empty_from(&extraction.fallback);

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page");
    Ok(ExtractionRecord::new(name, url.as_str(), fields))
}

fn found_count(record: &ExtractionRecord, category: Category) -> usize {
    if record.fields.is_found(category) {
        record.fields.get(category).len()
    } else {
        0
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Université", 20), "Université");
        assert_eq!(truncate("Université de Montréal", 10), "Université...");
    }

    #[test]
    fn durations_format() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn extract_file_uses_base_url_and_fallback() {
        let base = Url::parse("https://www.example.edu/").unwrap();
        let rec = extract_file(Path::new("tests/fixtures/structured.html"), Some(&base)).unwrap();
        assert_eq!(rec.name, "structured");
        assert_eq!(rec.url, "https://www.example.edu/");
        assert_eq!(rec.fields.courses.len(), 3);
        assert!(rec.error.is_none());
    }
}
