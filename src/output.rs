use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::ScrapeError;
use crate::record::ExtractionRecord;

/// Write records as pretty JSON to `primary`, retrying once at `fallback`.
/// Returns the path that was written.
pub fn save_records(
    records: &[ExtractionRecord],
    primary: &Path,
    fallback: &Path,
) -> Result<PathBuf, ScrapeError> {
    match write_json(records, primary) {
        Ok(()) => {
            info!("Saved {} records to {:?}", records.len(), primary);
            return Ok(primary.to_path_buf());
        }
        Err(e) => warn!("{}; trying fallback location {:?}", e, fallback),
    }

    match write_json(records, fallback) {
        Ok(()) => {
            info!("Saved {} records to fallback {:?}", records.len(), fallback);
            Ok(fallback.to_path_buf())
        }
        Err(e) => {
            error!("{}", e);
            Err(ScrapeError::Persist {
                primary: primary.to_path_buf(),
                fallback: fallback.to_path_buf(),
            })
        }
    }
}

fn write_json(records: &[ExtractionRecord], path: &Path) -> Result<(), ScrapeError> {
    let wrap = |source: std::io::Error| ScrapeError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    let json = serde_json::to_string_pretty(records).map_err(|e| wrap(e.into()))?;
    std::fs::write(path, json).map_err(wrap)
}
