use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::Context;

/// Prior-run cost anchor for the regression gate, read leniently from a
/// previous `report.json` so older report versions still work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub baseline_total_cost: f64,
}

impl Baseline {
    pub fn from_report_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let v: serde_json::Value = serde_json::from_slice(bytes).context("parse json")?;
        let total = v
            .get("totals")
            .and_then(|t| t.get("total_cost"))
            .and_then(|n| n.as_f64())
            .unwrap_or(0.0);
        Ok(Self {
            baseline_total_cost: total,
        })
    }

    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_report_json(&bytes)
    }
}
