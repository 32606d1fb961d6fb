mod metrics_json;

use std::{fs, path::Path};

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::types::MetricsSnapshot;

pub use metrics_json::parse_metrics_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct ParsedMetricsDir {
    pub mode: ParseMode,
    pub snapshots: Vec<MetricsSnapshot>,
    pub sources: Vec<String>,
}

static RE_METRICS_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9][a-z0-9_-]*_metrics\.json$").expect("valid regex"));

/// Scans a fetch-output directory for `*_metrics.json` files and parses each
/// into a snapshot. `BestEffort` logs and skips malformed files; `Strict`
/// fails on the first one. The byte budget caps how much file content is
/// read in total.
pub fn parse_metrics_dir(
    input: &Path,
    mode: ParseMode,
    max_total_bytes_scanned: u64,
) -> anyhow::Result<ParsedMetricsDir> {
    let mut snapshots: Vec<MetricsSnapshot> = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    let mut scanned: u64 = 0;

    for entry in WalkDir::new(input).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !RE_METRICS_FILE.is_match(name) {
            continue;
        }

        let meta = fs::metadata(path)?;
        let len = meta.len();
        if scanned.saturating_add(len) > max_total_bytes_scanned {
            break;
        }
        scanned += len;

        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        match parse_metrics_json(&bytes) {
            Ok(snapshot) => {
                log::debug!("parsed {} snapshot from {}", snapshot.service, path.display());
                snapshots.push(snapshot);
                sources.push(path.display().to_string());
            }
            Err(e) if mode == ParseMode::BestEffort => {
                log::warn!("skipping {}: {:#}", path.display(), e);
            }
            Err(e) => {
                return Err(e.context(format!("parse metrics file {}", path.display())));
            }
        }
    }

    snapshots.sort_by_key(|s| s.service);

    if mode == ParseMode::Strict && snapshots.is_empty() {
        anyhow::bail!(
            "insufficient input: no parseable *_metrics.json files under {}",
            input.display()
        );
    }

    Ok(ParsedMetricsDir {
        mode,
        snapshots,
        sources,
    })
}
