use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::settings::Settings;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { body: String },
    /// Retryable failure that outlived the attempt budget.
    SoftFailure { reason: String },
    /// Non-retryable: other 4xx, malformed URL.
    HardFailure { reason: String },
}

impl FetchOutcome {
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::SoftFailure { reason } | FetchOutcome::HardFailure { reason } => {
                Some(reason)
            }
        }
    }
}

/// Outcome of a fetch plus what it took to get there.
#[derive(Debug)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub attempts: u32,
    pub backoffs: Vec<Duration>,
}

/// Raw result of one HTTP attempt.
#[derive(Debug)]
pub enum Attempt {
    Response { status: u16, body: String },
    Timeout,
    Transport(String),
}

impl Attempt {
    fn describe(&self) -> String {
        match self {
            Attempt::Response { status, .. } => format!("HTTP {}", status),
            Attempt::Timeout => "timeout".to_string(),
            Attempt::Transport(e) => format!("transport error: {}", e),
        }
    }
}

/// Verdict on one attempt. Backoff is counted in configured units.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Done(FetchOutcome),
    Retry { units: u32, reason: String },
}

fn classify(attempt: u32, result: Attempt) -> Step {
    match result {
        Attempt::Response { status: 200, body } => Step::Done(FetchOutcome::Success { body }),
        Attempt::Response { status: s @ (403 | 429), .. } => Step::Retry {
            units: (attempt + 1) * 5,
            reason: format!("HTTP {} (rate limited)", s),
        },
        Attempt::Response { status: s @ 500..=599, .. } => Step::Retry {
            units: 2 * (attempt + 1),
            reason: format!("HTTP {}", s),
        },
        Attempt::Response { status, .. } => Step::Done(FetchOutcome::HardFailure {
            reason: format!("HTTP {}", status),
        }),
        Attempt::Timeout => Step::Retry {
            units: 2,
            reason: "timeout".to_string(),
        },
        Attempt::Transport(e) => Step::Retry {
            units: 1,
            reason: format!("transport error: {}", e),
        },
    }
}

enum RetryState {
    Attempting(u32),
    Backoff { next: u32, wait: Duration },
    Finished { outcome: FetchOutcome, attempts: u32 },
}

/// Bounded retry loop: `Attempting -> (Done | Backoff -> Attempting)`.
/// No sleep follows the final attempt.
pub async fn retry_loop<F, Fut>(
    url: &str,
    max_retries: u32,
    unit: Duration,
    mut attempt_fn: F,
) -> FetchReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt>,
{
    let max_retries = max_retries.max(1);
    let mut backoffs = Vec::new();
    let mut state = RetryState::Attempting(0);

    loop {
        state = match state {
            RetryState::Attempting(attempt) => {
                let result = attempt_fn(attempt).await;
                info!(url, attempt = attempt + 1, outcome = %result.describe(), "fetch attempt");
                match classify(attempt, result) {
                    Step::Done(outcome) => RetryState::Finished {
                        outcome,
                        attempts: attempt + 1,
                    },
                    Step::Retry { units, reason } if attempt + 1 < max_retries => {
                        let wait = unit * units;
                        warn!(
                            "{} on {} (attempt {}/{}), backing off {:.1}s",
                            reason,
                            url,
                            attempt + 1,
                            max_retries,
                            wait.as_secs_f64()
                        );
                        RetryState::Backoff {
                            next: attempt + 1,
                            wait,
                        }
                    }
                    Step::Retry { reason, .. } => RetryState::Finished {
                        outcome: FetchOutcome::SoftFailure {
                            reason: format!("exhausted retries ({})", reason),
                        },
                        attempts: attempt + 1,
                    },
                }
            }
            RetryState::Backoff { next, wait } => {
                backoffs.push(wait);
                tokio::time::sleep(wait).await;
                RetryState::Attempting(next)
            }
            RetryState::Finished { outcome, attempts } => {
                return FetchReport {
                    outcome,
                    attempts,
                    backoffs,
                }
            }
        };
    }
}

/// HTTP page fetcher with retry, backoff and identity rotation.
pub struct Fetcher {
    client: Client,
    user_agents: Vec<String>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Fetcher {
            client,
            user_agents: settings.user_agents.clone(),
            max_retries: settings.max_retries,
            backoff_unit: settings.backoff_unit(),
        })
    }

    /// Identity for an attempt: `attempt mod pool size`.
    pub fn user_agent(&self, attempt: u32) -> &str {
        if self.user_agents.is_empty() {
            return "Mozilla/5.0";
        }
        &self.user_agents[attempt as usize % self.user_agents.len()]
    }

    pub async fn fetch(&self, url: &str) -> FetchReport {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => return malformed(url, &format!("unsupported scheme {}", parsed.scheme())),
            Err(e) => return malformed(url, &e.to_string()),
        }
        retry_loop(url, self.max_retries, self.backoff_unit, |attempt| {
            self.attempt(url, attempt)
        })
        .await
    }

    async fn attempt(&self, url: &str, attempt: u32) -> Attempt {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent(attempt))
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANG)
            .send()
            .await;

        let result = match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if status == 200 {
                    match resp.text().await {
                        Ok(body) => Attempt::Response { status, body },
                        Err(e) if e.is_timeout() => Attempt::Timeout,
                        Err(e) => Attempt::Transport(e.to_string()),
                    }
                } else {
                    Attempt::Response {
                        status,
                        body: String::new(),
                    }
                }
            }
            Err(e) if e.is_timeout() => Attempt::Timeout,
            Err(e) => Attempt::Transport(e.to_string()),
        };
        debug!(url, latency_ms = start.elapsed().as_millis() as u64, "request finished");
        result
    }
}

fn malformed(url: &str, why: &str) -> FetchReport {
    warn!("Malformed URL {}: {}", url, why);
    FetchReport {
        outcome: FetchOutcome::HardFailure {
            reason: format!("malformed URL: {}", why),
        },
        attempts: 0,
        backoffs: Vec::new(),
    }
}
