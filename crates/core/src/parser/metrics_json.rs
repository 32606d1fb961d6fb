use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Datelike};
use serde::Deserialize;

use crate::error::AnalysisError;
use crate::types::{MetricsSnapshot, Service};

/// One `*_metrics.json` document as the fetch scripts write it.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    project_id: Option<String>,
    service: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    metrics: BTreeMap<String, Option<f64>>,
}

pub fn parse_metrics_json(bytes: &[u8]) -> anyhow::Result<MetricsSnapshot> {
    let raw: RawSnapshot = serde_json::from_slice(bytes).context("parse metrics json")?;

    let service = Service::parse(&raw.service)?;

    let start = DateTime::parse_from_rfc3339(&raw.start_date)
        .with_context(|| format!("invalid start_date {:?}", raw.start_date))?;
    let end = DateTime::parse_from_rfc3339(&raw.end_date)
        .with_context(|| format!("invalid end_date {:?}", raw.end_date))?;

    let days = (end - start).num_days();
    if days < 1 {
        return Err(AnalysisError::EmptyPeriod(days).into());
    }
    if start.day() != 1 {
        log::warn!(
            "{} window starts on day {} of the month; monthly free tiers may not line up",
            service,
            start.day()
        );
    }

    Ok(MetricsSnapshot {
        project_id: raw.project_id.unwrap_or_else(|| "unknown".to_string()),
        service,
        period_days: days as u32,
        values: raw.metrics,
    })
}
