use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    baseline::Baseline,
    parser::ParseMode,
    pricing::CostBreakdown,
    types::{Finding, Service},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_version: String,
    pub inputs: Inputs,
    pub totals: Totals,
    pub services: Vec<ServiceReport>,
    pub failures: Vec<ServiceFailure>,
    pub baseline_comparison: Option<BaselineComparison>,
    pub budget: Option<BudgetResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inputs {
    pub input_path: String,
    pub parse_mode: String,
    pub sources: Vec<String>,
}

/// One service's completed pipeline: validated snapshot, itemized costs,
/// ordered findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
    pub service: Service,
    pub project_id: String,
    pub period_days: u32,
    pub breakdown: CostBreakdown,
    pub findings: Vec<Finding>,
}

/// A pipeline that failed. Recorded instead of aborting the batch, so the
/// other services still get their reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFailure {
    pub service: Service,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub total_cost: f64,
    pub free_tier_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub baseline_total_cost: f64,
    pub regression_ratio: f64,
    pub delta_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetResult {
    pub threshold_regression_ratio: Option<f64>,
    pub pass: bool,
    pub reason: String,
}

impl Report {
    pub fn new(
        input: &Path,
        mode: ParseMode,
        totals: Totals,
        services: Vec<ServiceReport>,
        failures: Vec<ServiceFailure>,
        baseline_comparison: Option<BaselineComparison>,
        budget: Option<BudgetResult>,
    ) -> Self {
        Self {
            report_version: "0.1.0".to_string(),
            inputs: Inputs {
                input_path: input.display().to_string(),
                parse_mode: match mode {
                    ParseMode::Strict => "STRICT".to_string(),
                    ParseMode::BestEffort => "BEST_EFFORT".to_string(),
                },
                sources: vec![],
            },
            totals,
            services,
            failures,
            baseline_comparison,
            budget,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut s = String::new();
        s.push_str("# cloudwaste report\n\n");
        s.push_str(&format!("- report_version: `{}`\n", self.report_version));
        s.push_str(&format!("- input_path: `{}`\n", self.inputs.input_path));
        s.push_str(&format!("- parse_mode: `{}`\n", self.inputs.parse_mode));
        s.push('\n');

        s.push_str("## Totals\n\n");
        s.push_str(&format!("- total_cost: `{}`\n", usd(self.totals.total_cost)));
        s.push_str(&format!(
            "- free_tier_savings: `{}`\n",
            usd(self.totals.free_tier_savings)
        ));
        s.push('\n');

        if let Some(cmp) = &self.baseline_comparison {
            s.push_str("## Baseline comparison\n\n");
            s.push_str(&format!(
                "- baseline_total_cost: `{}`\n",
                usd(cmp.baseline_total_cost)
            ));
            s.push_str(&format!("- delta_cost: `{}`\n", usd(cmp.delta_cost)));
            s.push_str(&format!(
                "- regression_ratio: `{:.3}`\n",
                cmp.regression_ratio
            ));
            s.push('\n');
        }

        if let Some(b) = &self.budget {
            s.push_str("## Budget gate\n\n");
            s.push_str(&format!("- pass: `{}`\n", b.pass));
            s.push_str(&format!("- reason: `{}`\n", b.reason));
            s.push('\n');
        }

        for svc in &self.services {
            s.push_str(&format!("## {}\n\n", svc.service));
            s.push_str(&format!("- project_id: `{}`\n", svc.project_id));
            s.push_str(&format!("- period_days: `{}`\n", svc.period_days));
            s.push_str(&format!(
                "- total_cost: `{}`\n",
                usd(svc.breakdown.total_cost)
            ));
            s.push_str(&format!(
                "- free_tier_savings: `{}`\n",
                usd(svc.breakdown.free_tier_savings)
            ));
            s.push_str("- line_items:\n");
            for item in &svc.breakdown.line_items {
                s.push_str(&format!(
                    "  - {}: raw `{}`, free `{}`, billable `{}`, cost `{}`\n",
                    item.component,
                    num(item.raw_usage),
                    num(item.free_tier_allowance),
                    num(item.billable_usage),
                    usd(item.cost)
                ));
            }
            s.push('\n');

            s.push_str("### Findings\n\n");
            if svc.findings.is_empty() {
                s.push_str("- (none)\n\n");
            } else {
                for f in &svc.findings {
                    s.push_str(&format!("#### {}\n\n", f.pattern_id));
                    s.push_str(&format!("- severity: `{:?}`\n", f.severity));
                    s.push_str(&format!("- confidence: `{:?}`\n", f.confidence));
                    if let Some(ratio) = f.evidence.ratio {
                        s.push_str(&format!("- ratio: `{:.1}`\n", ratio));
                    }
                    if !f.evidence.metrics.is_empty() {
                        s.push_str("- evidence:\n");
                        for (name, value) in &f.evidence.metrics {
                            s.push_str(&format!("  - {} = {}\n", name, num(*value)));
                        }
                    }
                    s.push_str(&format!(
                        "- estimated_savings_pct: `{:.0}%-{:.0}%`\n",
                        f.estimated_savings_pct.low, f.estimated_savings_pct.high
                    ));
                    if let Some(usd_range) = &f.estimated_savings_usd {
                        s.push_str(&format!(
                            "- estimated_savings_usd: `{}-{}`\n",
                            usd(usd_range.low),
                            usd(usd_range.high)
                        ));
                    }
                    s.push_str(&format!("- likely_cause: {}\n", f.likely_cause));
                    if !f.suggested_actions.is_empty() {
                        s.push_str("- suggested_actions:\n");
                        for a in &f.suggested_actions {
                            s.push_str(&format!("  - {}\n", a));
                        }
                    }
                    s.push('\n');
                }
            }
        }

        if !self.failures.is_empty() {
            s.push_str("## Failures\n\n");
            for fail in &self.failures {
                s.push_str(&format!("- {}: {}\n", fail.service, fail.error));
            }
            s.push('\n');
        }

        s
    }
}

// Currency is rounded to cents here and nowhere earlier; internal values
// keep full precision so rounding error never compounds across components.
fn usd(v: f64) -> String {
    format!("${:.2}", v)
}

fn num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

pub fn compare_to_baseline(b: &Baseline, totals: &Totals) -> BaselineComparison {
    let baseline = b.baseline_total_cost;
    let regression_ratio = if baseline == 0.0 {
        if totals.total_cost == 0.0 {
            1.0
        } else {
            f64::INFINITY
        }
    } else {
        totals.total_cost / baseline
    };

    BaselineComparison {
        baseline_total_cost: baseline,
        regression_ratio,
        delta_cost: totals.total_cost - baseline,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::pricing::LineItem;
    use crate::types::{
        ConfidenceLevel, Evidence, Finding, PatternId, SavingsRange, Severity,
    };

    fn sample_report() -> Report {
        Report {
            report_version: "0.1.0".to_string(),
            inputs: Inputs {
                input_path: "metrics-out".to_string(),
                parse_mode: "STRICT".to_string(),
                sources: vec!["metrics-out/firestore_metrics.json".to_string()],
            },
            totals: Totals {
                total_cost: 124.84,
                free_tier_savings: 1.64,
            },
            services: vec![ServiceReport {
                service: Service::Firestore,
                project_id: "demo".to_string(),
                period_days: 31,
                breakdown: CostBreakdown {
                    service: Service::Firestore,
                    line_items: vec![LineItem {
                        component: "document_reads".to_string(),
                        raw_usage: 69_852_686.0,
                        free_tier_allowance: 1_550_000.0,
                        billable_usage: 68_302_686.0,
                        unit_size: 100_000.0,
                        unit_price: 0.06,
                        cost: 40.98,
                    }],
                    total_cost: 124.84,
                    free_tier_savings: 1.64,
                },
                findings: vec![Finding {
                    pattern_id: PatternId::DbOverReading,
                    severity: Severity::High,
                    confidence: ConfidenceLevel::High,
                    evidence: Evidence {
                        metrics: BTreeMap::from([
                            ("reads".to_string(), 69_852_686.0),
                            ("writes".to_string(), 291_183.0),
                        ]),
                        ratio: Some(239.9),
                    },
                    likely_cause: "cause".to_string(),
                    suggested_actions: vec!["action".to_string()],
                    estimated_savings_pct: SavingsRange {
                        low: 30.0,
                        high: 70.0,
                    },
                    estimated_savings_usd: None,
                }],
            }],
            failures: vec![ServiceFailure {
                service: Service::Bigquery,
                error: "incomplete data".to_string(),
            }],
            baseline_comparison: Some(BaselineComparison {
                baseline_total_cost: 100.0,
                regression_ratio: 1.2484,
                delta_cost: 24.84,
            }),
            budget: Some(BudgetResult {
                threshold_regression_ratio: Some(1.1),
                pass: false,
                reason: "regression_ratio 1.248 exceeds threshold 1.100".to_string(),
            }),
        }
    }

    #[test]
    fn markdown_includes_sections_and_findings() {
        let md = sample_report().to_markdown();
        assert!(md.contains("## Totals"));
        assert!(md.contains("## Baseline comparison"));
        assert!(md.contains("## Budget gate"));
        assert!(md.contains("## firestore"));
        assert!(md.contains("#### db_over_reading"));
        assert!(md.contains("- reads = 69852686"));
        assert!(md.contains("## Failures"));
        assert!(md.contains("- bigquery: incomplete data"));
    }

    #[test]
    fn currency_rounds_only_in_rendering() {
        let md = sample_report().to_markdown();
        assert!(md.contains("- total_cost: `$124.84`"));
        assert!(md.contains("cost `$40.98`"));
    }

    #[test]
    fn baseline_comparison_infinite_when_baseline_zero() {
        let b = Baseline {
            baseline_total_cost: 0.0,
        };
        let totals = Totals {
            total_cost: 10.0,
            free_tier_savings: 0.0,
        };
        let cmp = compare_to_baseline(&b, &totals);
        assert!(cmp.regression_ratio.is_infinite());
    }

    #[test]
    fn baseline_comparison_is_one_when_both_zero() {
        let b = Baseline {
            baseline_total_cost: 0.0,
        };
        let cmp = compare_to_baseline(&b, &Totals::default());
        assert_eq!(cmp.regression_ratio, 1.0);
    }
}
