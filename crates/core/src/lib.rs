pub mod baseline;
pub mod config;
pub mod detect;
pub mod error;
pub mod parser;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validate;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::{
    baseline::Baseline,
    error::AnalysisError,
    parser::ParseMode,
    report::{BaselineComparison, BudgetResult, Report, ServiceFailure, ServiceReport, Totals},
    types::{MetricsSnapshot, Service},
};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub strict: bool,
    pub baseline_path: Option<std::path::PathBuf>,
    pub budget_ratio: Option<f64>,
    /// Overrides the period computed from each snapshot's date window.
    pub period_days: Option<u32>,
    /// Restricts the run to these services; `None` analyzes everything found.
    pub services: Option<Vec<Service>>,
    pub service_budgets: HashMap<String, f64>,
    pub max_total_bytes_scanned: u64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            strict: false,
            baseline_path: None,
            budget_ratio: None,
            period_days: None,
            services: None,
            service_budgets: HashMap::new(),
            max_total_bytes_scanned: 50 * 1024 * 1024,
        }
    }
}

/// Runs one service's pipeline: completeness gate, then pricing, then
/// pattern detection. The validator must pass before any cost math runs.
pub fn analyze_snapshot(snapshot: &MetricsSnapshot) -> Result<ServiceReport, AnalysisError> {
    validate::validate(snapshot)?;
    let breakdown = pricing::calculate(snapshot)?;
    let findings = detect::detect(snapshot, Some(&breakdown));
    Ok(ServiceReport {
        service: snapshot.service,
        project_id: snapshot.project_id.clone(),
        period_days: snapshot.period_days,
        breakdown,
        findings,
    })
}

pub fn analyze_dir(input: &Path, opts: AnalyzeOptions) -> anyhow::Result<Report> {
    let parse_mode = if opts.strict {
        ParseMode::Strict
    } else {
        ParseMode::BestEffort
    };

    let parsed = parser::parse_metrics_dir(input, parse_mode, opts.max_total_bytes_scanned)
        .with_context(|| format!("failed to read metrics files at {}", input.display()))?;

    let mut services: Vec<ServiceReport> = Vec::new();
    let mut failures: Vec<ServiceFailure> = Vec::new();

    // Each service's pipeline fails on its own; the rest of the batch keeps
    // going.
    for mut snapshot in parsed.snapshots {
        if let Some(filter) = &opts.services {
            if !filter.contains(&snapshot.service) {
                continue;
            }
        }
        if let Some(days) = opts.period_days {
            snapshot.period_days = days;
        }

        match analyze_snapshot(&snapshot) {
            Ok(report) => services.push(report),
            Err(e) => {
                log::warn!("analysis failed for {}: {}", snapshot.service, e);
                failures.push(ServiceFailure {
                    service: snapshot.service,
                    error: e.to_string(),
                });
            }
        }
    }

    let totals = Totals {
        total_cost: services.iter().map(|s| s.breakdown.total_cost).sum(),
        free_tier_savings: services
            .iter()
            .map(|s| s.breakdown.free_tier_savings)
            .sum(),
    };

    let baseline = match &opts.baseline_path {
        Some(p) => Some(
            Baseline::load_json(p)
                .with_context(|| format!("failed to load baseline {}", p.display()))?,
        ),
        None => None,
    };

    let baseline_comparison = baseline
        .as_ref()
        .map(|b| report::compare_to_baseline(b, &totals));

    let budget = evaluate_budget(&opts, &services, baseline_comparison.as_ref());

    let mut report = Report::new(
        input,
        parse_mode,
        totals,
        services,
        failures,
        baseline_comparison,
        budget,
    );
    report.inputs.sources = parsed.sources;

    Ok(report)
}

fn evaluate_budget(
    opts: &AnalyzeOptions,
    services: &[ServiceReport],
    cmp: Option<&BaselineComparison>,
) -> Option<BudgetResult> {
    let mut applicable = false;
    let mut violations: Vec<String> = Vec::new();

    if let (Some(threshold), Some(cmp)) = (opts.budget_ratio, cmp) {
        applicable = true;
        if cmp.regression_ratio > threshold {
            violations.push(format!(
                "regression_ratio {:.3} exceeds threshold {:.3}",
                cmp.regression_ratio, threshold
            ));
        }
    }

    for svc in services {
        if let Some(ceiling) = opts.service_budgets.get(svc.service.as_str()) {
            applicable = true;
            if svc.breakdown.total_cost > *ceiling {
                violations.push(format!(
                    "{} cost ${:.2} exceeds budget ${:.2}",
                    svc.service, svc.breakdown.total_cost, ceiling
                ));
            }
        }
    }

    if !applicable {
        return None;
    }

    let pass = violations.is_empty();
    Some(BudgetResult {
        threshold_regression_ratio: opts.budget_ratio,
        pass,
        reason: if pass {
            "within budget".to_string()
        } else {
            violations.join("; ")
        },
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::pricing::GIB;
    use crate::types::{metrics, PatternId};

    fn firestore_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            project_id: "demo".to_string(),
            service: Service::Firestore,
            period_days: 31,
            values: BTreeMap::from([
                (metrics::FIRESTORE_READS.to_string(), Some(69_852_686.0)),
                (metrics::FIRESTORE_WRITES.to_string(), Some(291_183.0)),
                (metrics::FIRESTORE_DELETES.to_string(), Some(15_218.0)),
                (
                    metrics::FIRESTORE_STORAGE_BYTES.to_string(),
                    Some(466.88 * GIB),
                ),
            ]),
        }
    }

    #[test]
    fn pipeline_prices_then_detects() {
        let report = analyze_snapshot(&firestore_snapshot()).unwrap();

        assert!((report.breakdown.total_cost - 124.84).abs() < 0.01);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].pattern_id, PatternId::DbOverReading);
        // Findings get dollar estimates scaled from the breakdown.
        assert!(report.findings[0].estimated_savings_usd.is_some());
    }

    #[test]
    fn incomplete_snapshot_never_reaches_the_calculator() {
        let mut snap = firestore_snapshot();
        snap.values.remove(metrics::FIRESTORE_WRITES);

        let err = analyze_snapshot(&snap).unwrap_err();
        match err {
            AnalysisError::IncompleteData { missing, .. } => {
                assert_eq!(missing, vec![metrics::FIRESTORE_WRITES.to_string()]);
            }
            other => panic!("expected IncompleteData, got {other:?}"),
        }
    }

    #[test]
    fn calculator_is_deterministic_across_calls() {
        let snap = firestore_snapshot();
        let a = pricing::calculate(&snap).unwrap();
        let b = pricing::calculate(&snap).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn service_budget_ceiling_fails_the_gate() {
        let report = analyze_snapshot(&firestore_snapshot()).unwrap();
        let opts = AnalyzeOptions {
            service_budgets: HashMap::from([("firestore".to_string(), 100.0)]),
            ..AnalyzeOptions::default()
        };

        let budget = evaluate_budget(&opts, std::slice::from_ref(&report), None).unwrap();
        assert!(!budget.pass);
        assert!(budget.reason.contains("firestore"));
    }

    #[test]
    fn no_budget_configured_means_no_gate() {
        let report = analyze_snapshot(&firestore_snapshot()).unwrap();
        let opts = AnalyzeOptions::default();
        assert!(evaluate_budget(&opts, std::slice::from_ref(&report), None).is_none());
    }
}
