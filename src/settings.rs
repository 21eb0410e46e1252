use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ScrapeError;

const ENV_PREFIX: &str = "ADMIT";
const CONFIG_FILE: &str = "admissions";

/// Desktop browser identities rotated across fetch attempts.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Run-wide settings, passed explicitly to the fetcher and the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_secs: f64,
    pub batch_size: usize,
    pub max_secondary_links: usize,
    /// All backoff multipliers are expressed in this unit.
    pub backoff_unit_ms: u64,
    pub user_agents: Vec<String>,
    pub output_path: PathBuf,
    pub fallback_output_path: PathBuf,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout_secs: 10,
            max_retries: 3,
            rate_limit_secs: 2.0,
            batch_size: 1,
            max_secondary_links: 2,
            backoff_unit_ms: 1000,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            output_path: PathBuf::from("data/admissions_data.json"),
            fallback_output_path: PathBuf::from("emergency_data.json"),
            db_path: PathBuf::from("data/admissions.sqlite"),
        }
    }
}

impl Settings {
    /// Layer `admissions.toml` (optional) and `ADMIT_*` environment variables
    /// over the defaults.
    pub fn load() -> Result<Self, ScrapeError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator("|")
                    .with_list_parse_key("user_agents"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings.sanitized())
    }

    /// Clamp values that would otherwise stall or break a run.
    pub fn sanitized(mut self) -> Self {
        if self.max_retries == 0 {
            self.max_retries = 1;
        }
        if self.batch_size == 0 {
            self.batch_size = 1;
        }
        if !self.rate_limit_secs.is_finite() || self.rate_limit_secs < 0.0 {
            self.rate_limit_secs = 0.0;
        }
        self.user_agents.retain(|ua| !ua.trim().is_empty());
        if self.user_agents.is_empty() {
            self.user_agents = Settings::default().user_agents;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}
