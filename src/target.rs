use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ScrapeError;

/// One organisation to process. Read from the input list, never mutated
/// during a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Target {
    #[cfg(test)]
    pub fn new(name: &str, url: &str) -> Self {
        Target {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Load a JSON array of `{name, url}` records.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ScrapeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ScrapeError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let targets: Vec<Target> =
        serde_json::from_str(&raw).map_err(|source| ScrapeError::ParseInput {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Loaded {} targets from {:?}", targets.len(), path);
    Ok(targets)
}

/// Prefix `https://` when the URL carries no http(s) scheme.
/// Returns `None` for a blank URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url.trim_start_matches('/')))
    }
}

/// Drop targets without a URL and normalise the rest, keeping input order.
pub fn prepare_targets(targets: Vec<Target>) -> Vec<Target> {
    targets
        .into_iter()
        .filter_map(|t| {
            let label = if t.name.is_empty() { "unknown" } else { t.name.as_str() };
            let Some(url) = normalize_url(&t.url) else {
                warn!("Missing URL for {}, skipping", label);
                return None;
            };
            if url != t.url {
                info!("Fixed URL format for {}: {}", label, url);
            }
            let name = if t.name.trim().is_empty() {
                url.clone()
            } else {
                t.name.trim().to_string()
            };
            Some(Target { name, url })
        })
        .collect()
}
