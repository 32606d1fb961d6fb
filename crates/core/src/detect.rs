use std::collections::BTreeMap;

use crate::pricing::{CostBreakdown, GIB};
use crate::types::{
    metrics, ConfidenceLevel, Evidence, Finding, MetricsSnapshot, PatternId, SavingsRange,
    Service, Severity,
};

struct PatternInfo {
    id: PatternId,
    savings_pct: SavingsRange,
    likely_cause: &'static str,
    suggested_actions: &'static [&'static str],
}

static CATALOG: [PatternInfo; 5] = [
    PatternInfo {
        id: PatternId::DbOverReading,
        savings_pct: SavingsRange {
            low: 30.0,
            high: 70.0,
        },
        likely_cause: "Unbounded queries or missing client-side caching re-read documents that rarely change",
        suggested_actions: &[
            "Add limits to collection queries and paginate large result sets",
            "Cache hot documents client-side or behind a memoized listener",
            "Replace polling reads with snapshot listeners",
        ],
    },
    PatternInfo {
        id: PatternId::RtdbOverDownloading,
        savings_pct: SavingsRange {
            low: 40.0,
            high: 80.0,
        },
        likely_cause: "Clients subscribe to broad nodes and re-download the tree on every change",
        suggested_actions: &[
            "Narrow listeners to the leaf nodes clients actually render",
            "Denormalize large nodes so updates touch small subtrees",
            "Move cold data out of the realtime tree",
        ],
    },
    PatternInfo {
        id: PatternId::FunctionsAlwaysOn,
        savings_pct: SavingsRange {
            low: 50.0,
            high: 90.0,
        },
        likely_cause: "Reserved instances idle between sparse invocations while billing for warm time",
        suggested_actions: &[
            "Set min_instances to 0 for low-traffic functions",
            "Batch sparse triggers into fewer invocations",
            "Keep reserved capacity only on latency-critical paths",
        ],
    },
    PatternInfo {
        id: PatternId::BigquerySprawl,
        savings_pct: SavingsRange {
            low: 10.0,
            high: 40.0,
        },
        likely_cause: "Many small unpartitioned tables accrue storage and slow scans without expiry",
        suggested_actions: &[
            "Consolidate small tables into partitioned tables",
            "Set default partition expiration on working datasets",
            "Archive stale tables to Cloud Storage",
        ],
    },
    PatternInfo {
        id: PatternId::StorageClassInefficiency,
        savings_pct: SavingsRange {
            low: 30.0,
            high: 60.0,
        },
        likely_cause: "Objects that are rarely touched sit in the standard class with no lifecycle transition",
        suggested_actions: &[
            "Add a lifecycle rule transitioning old objects to Nearline or Coldline",
            "Set lifecycle deletion for transient artifacts",
        ],
    },
];

fn catalog(id: PatternId) -> &'static PatternInfo {
    CATALOG
        .iter()
        .find(|p| p.id == id)
        .expect("pattern registered in catalog")
}

fn finding(
    id: PatternId,
    severity: Severity,
    confidence: ConfidenceLevel,
    evidence: Evidence,
) -> Finding {
    let info = catalog(id);
    Finding {
        pattern_id: id,
        severity,
        confidence,
        evidence,
        likely_cause: info.likely_cause.to_string(),
        suggested_actions: info
            .suggested_actions
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        estimated_savings_pct: info.savings_pct,
        estimated_savings_usd: None,
    }
}

/// Floors a zero denominator to 1 so extreme ratios stay finite instead of
/// dividing by zero. Callers treat the floored case as maximal severity with
/// low confidence, since the ratio is synthetic.
fn floored_ratio(numerator: f64, denominator: f64) -> (f64, bool) {
    if denominator <= 0.0 {
        (numerator, true)
    } else {
        (numerator / denominator, false)
    }
}

/// Evaluates every registered pattern against the snapshot. Patterns are
/// independent; several may fire from one snapshot and none firing is an
/// empty result, not an error. When a breakdown is supplied, the fixed
/// percentage ranges are also scaled into dollar estimates.
pub fn detect(snapshot: &MetricsSnapshot, breakdown: Option<&CostBreakdown>) -> Vec<Finding> {
    let mut findings = match snapshot.service {
        Service::Firestore => firestore_rules(snapshot),
        Service::RealtimeDatabase => rtdb_rules(snapshot),
        Service::CloudFunctions => functions_rules(snapshot),
        Service::Bigquery => bigquery_rules(snapshot),
        Service::CloudStorage => storage_rules(snapshot),
        Service::CloudRun => Vec::new(),
    };

    if let Some(b) = breakdown {
        for f in &mut findings {
            f.estimated_savings_usd = Some(SavingsRange {
                low: b.total_cost * f.estimated_savings_pct.low / 100.0,
                high: b.total_cost * f.estimated_savings_pct.high / 100.0,
            });
        }
    }

    order_findings(&mut findings);
    findings
}

/// Descending estimated-savings upper bound, ties broken by pattern id, so
/// reports are byte-stable across runs.
pub fn order_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.estimated_savings_pct
            .high
            .partial_cmp(&a.estimated_savings_pct.high)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pattern_id.as_str().cmp(b.pattern_id.as_str()))
    });
}

fn firestore_rules(snap: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let (Some(reads), Some(writes)) = (
        snap.metric(metrics::FIRESTORE_READS),
        snap.metric(metrics::FIRESTORE_WRITES),
    ) {
        let (ratio, floored) = floored_ratio(reads, writes);
        if ratio > 50.0 {
            let severity = if floored || ratio > 150.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            let confidence = if floored {
                ConfidenceLevel::Low
            } else if ratio > 200.0 {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Medium
            };
            findings.push(finding(
                PatternId::DbOverReading,
                severity,
                confidence,
                Evidence {
                    metrics: BTreeMap::from([
                        ("reads".to_string(), reads),
                        ("writes".to_string(), writes),
                    ]),
                    ratio: Some(ratio),
                },
            ));
        }
    }

    findings
}

fn rtdb_rules(snap: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let (Some(bandwidth), Some(storage)) = (
        snap.metric(metrics::RTDB_SENT_BYTES),
        snap.metric(metrics::RTDB_STORAGE_BYTES),
    ) {
        let (ratio, floored) = floored_ratio(bandwidth, storage);
        if ratio > 2.0 {
            let severity = if floored || ratio > 10.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            let confidence = if floored {
                ConfidenceLevel::Low
            } else if ratio > 8.0 {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Medium
            };
            findings.push(finding(
                PatternId::RtdbOverDownloading,
                severity,
                confidence,
                Evidence {
                    metrics: BTreeMap::from([
                        ("bandwidth_bytes".to_string(), bandwidth),
                        ("storage_bytes".to_string(), storage),
                    ]),
                    ratio: Some(ratio),
                },
            ));
        }
    }

    findings
}

fn functions_rules(snap: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let (Some(min_instances), Some(executions)) = (
        snap.metric(metrics::FUNCTIONS_MIN_INSTANCES),
        snap.metric(metrics::FUNCTIONS_EXECUTIONS),
    ) {
        let per_day = executions / f64::from(snap.period_days.max(1));
        if min_instances > 0.0 && per_day < 1000.0 {
            let severity = if per_day < 100.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            let confidence = if per_day < 500.0 {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Medium
            };
            findings.push(finding(
                PatternId::FunctionsAlwaysOn,
                severity,
                confidence,
                Evidence {
                    metrics: BTreeMap::from([
                        ("min_instances".to_string(), min_instances),
                        ("executions".to_string(), executions),
                    ]),
                    ratio: Some(per_day),
                },
            ));
        }
    }

    findings
}

fn bigquery_rules(snap: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let (Some(table_count), Some(stored_bytes), Some(partitioned)) = (
        snap.metric(metrics::BIGQUERY_TABLE_COUNT),
        snap.metric(metrics::BIGQUERY_STORED_BYTES),
        snap.metric(metrics::BIGQUERY_PARTITION_EXPIRATION),
    ) {
        if table_count > 100.0 {
            let avg_bytes = stored_bytes / table_count;
            if avg_bytes < GIB && partitioned == 0.0 {
                let severity = if table_count > 500.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let confidence = if avg_bytes < 0.25 * GIB {
                    ConfidenceLevel::High
                } else {
                    ConfidenceLevel::Medium
                };
                findings.push(finding(
                    PatternId::BigquerySprawl,
                    severity,
                    confidence,
                    Evidence {
                        metrics: BTreeMap::from([
                            ("table_count".to_string(), table_count),
                            ("stored_bytes".to_string(), stored_bytes),
                        ]),
                        ratio: Some(avg_bytes / GIB),
                    },
                ));
            }
        }
    }

    findings
}

fn storage_rules(snap: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let (Some(age_days), Some(standard_class), Some(lifecycle_rules)) = (
        snap.metric(metrics::STORAGE_OBJECT_AGE_DAYS),
        snap.metric(metrics::STORAGE_STANDARD_CLASS),
        snap.metric(metrics::STORAGE_LIFECYCLE_RULES),
    ) {
        if age_days > 30.0 && standard_class > 0.0 && lifecycle_rules == 0.0 {
            let severity = if age_days > 90.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            let confidence = if age_days > 180.0 {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Medium
            };
            findings.push(finding(
                PatternId::StorageClassInefficiency,
                severity,
                confidence,
                Evidence {
                    metrics: BTreeMap::from([
                        ("avg_age_days".to_string(), age_days),
                        ("lifecycle_rule_count".to_string(), lifecycle_rules),
                    ]),
                    ratio: Some(age_days),
                },
            ));
        }
    }

    findings
}
