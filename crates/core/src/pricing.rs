use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::{metrics, MetricsSnapshot, Service};

pub const GIB: f64 = 1_073_741_824.0;
pub const TIB: f64 = GIB * 1024.0;

/// How a free-tier allowance resolves against the billing window.
#[derive(Debug, Clone, Copy)]
pub enum FreeTier {
    /// Count accrual: the grant is per calendar day and scales with the
    /// period (e.g. 50K free Firestore reads per day).
    PerDay(f64),
    /// Constant ceiling regardless of period length. Storage gauges are a
    /// point-in-time measure, not a per-day accrual, and monthly grant
    /// buckets behave the same way.
    Flat(f64),
    None,
}

impl FreeTier {
    fn resolve(self, period_days: u32) -> f64 {
        match self {
            FreeTier::PerDay(per_day) => per_day * f64::from(period_days),
            FreeTier::Flat(total) => total,
            FreeTier::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ComponentSpec {
    component: &'static str,
    metric: &'static str,
    free_tier: FreeTier,
    unit_size: f64,
    unit_price: f64,
}

// Multi-region list prices. Firestore/RTDB/Functions/BigQuery follow the
// original billing reconciliation; Cloud Storage and Cloud Run were filled in
// from the published price sheets.
static FIRESTORE: [ComponentSpec; 4] = [
    ComponentSpec {
        component: "document_reads",
        metric: metrics::FIRESTORE_READS,
        free_tier: FreeTier::PerDay(50_000.0),
        unit_size: 100_000.0,
        unit_price: 0.06,
    },
    ComponentSpec {
        component: "document_writes",
        metric: metrics::FIRESTORE_WRITES,
        free_tier: FreeTier::PerDay(20_000.0),
        unit_size: 100_000.0,
        unit_price: 0.18,
    },
    ComponentSpec {
        component: "document_deletes",
        metric: metrics::FIRESTORE_DELETES,
        free_tier: FreeTier::PerDay(20_000.0),
        unit_size: 100_000.0,
        unit_price: 0.02,
    },
    ComponentSpec {
        component: "stored_data",
        metric: metrics::FIRESTORE_STORAGE_BYTES,
        free_tier: FreeTier::Flat(GIB),
        unit_size: GIB,
        unit_price: 0.18,
    },
];

static REALTIME_DATABASE: [ComponentSpec; 2] = [
    ComponentSpec {
        component: "stored_data",
        metric: metrics::RTDB_STORAGE_BYTES,
        free_tier: FreeTier::Flat(GIB),
        unit_size: GIB,
        unit_price: 5.00,
    },
    ComponentSpec {
        component: "outbound_bandwidth",
        metric: metrics::RTDB_SENT_BYTES,
        free_tier: FreeTier::Flat(10.0 * GIB),
        unit_size: GIB,
        unit_price: 1.00,
    },
];

// Invocations only; compute time varies with memory configuration and is
// reconciled against the billing export, not estimated here. The 2M free
// grant is deliberately not deducted, matching the source analysis.
static CLOUD_FUNCTIONS: [ComponentSpec; 1] = [ComponentSpec {
    component: "invocations",
    metric: metrics::FUNCTIONS_EXECUTIONS,
    free_tier: FreeTier::None,
    unit_size: 1_000_000.0,
    unit_price: 0.40,
}];

static BIGQUERY: [ComponentSpec; 2] = [
    ComponentSpec {
        component: "active_storage",
        metric: metrics::BIGQUERY_STORED_BYTES,
        free_tier: FreeTier::None,
        unit_size: GIB,
        unit_price: 0.02,
    },
    ComponentSpec {
        component: "queries_scanned",
        metric: metrics::BIGQUERY_SCANNED_BYTES,
        free_tier: FreeTier::None,
        unit_size: TIB,
        unit_price: 5.00,
    },
];

static CLOUD_STORAGE: [ComponentSpec; 3] = [
    ComponentSpec {
        component: "stored_data",
        metric: metrics::STORAGE_TOTAL_BYTES,
        free_tier: FreeTier::Flat(5.0 * GIB),
        unit_size: GIB,
        unit_price: 0.026,
    },
    ComponentSpec {
        component: "network_egress",
        metric: metrics::STORAGE_SENT_BYTES,
        free_tier: FreeTier::Flat(GIB),
        unit_size: GIB,
        unit_price: 0.12,
    },
    ComponentSpec {
        component: "class_a_operations",
        metric: metrics::STORAGE_REQUESTS,
        free_tier: FreeTier::Flat(5_000.0),
        unit_size: 10_000.0,
        unit_price: 0.05,
    },
];

static CLOUD_RUN: [ComponentSpec; 2] = [
    ComponentSpec {
        component: "requests",
        metric: metrics::RUN_REQUESTS,
        free_tier: FreeTier::Flat(2_000_000.0),
        unit_size: 1_000_000.0,
        unit_price: 0.40,
    },
    ComponentSpec {
        component: "vcpu_time",
        metric: metrics::RUN_CPU_SECONDS,
        free_tier: FreeTier::Flat(180_000.0),
        unit_size: 1.0,
        unit_price: 0.000_024,
    },
];

static PRICING: Lazy<BTreeMap<Service, &'static [ComponentSpec]>> = Lazy::new(|| {
    BTreeMap::from([
        (Service::Firestore, &FIRESTORE[..]),
        (Service::RealtimeDatabase, &REALTIME_DATABASE[..]),
        (Service::CloudFunctions, &CLOUD_FUNCTIONS[..]),
        (Service::Bigquery, &BIGQUERY[..]),
        (Service::CloudStorage, &CLOUD_STORAGE[..]),
        (Service::CloudRun, &CLOUD_RUN[..]),
    ])
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub component: String,
    pub raw_usage: f64,
    pub free_tier_allowance: f64,
    pub billable_usage: f64,
    pub unit_size: f64,
    pub unit_price: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub service: Service,
    pub line_items: Vec<LineItem>,
    pub total_cost: f64,
    /// What the free tier absorbed: the price of the usage that fell under
    /// each allowance.
    pub free_tier_savings: f64,
}

/// Itemizes the snapshot against the service's pricing table. Pure and
/// deterministic; costs stay at full precision, currency rounding happens
/// only when a report is rendered.
pub fn calculate(snapshot: &MetricsSnapshot) -> Result<CostBreakdown, AnalysisError> {
    let specs = PRICING
        .get(&snapshot.service)
        .ok_or_else(|| AnalysisError::UnknownService(snapshot.service.to_string()))?;

    for (name, value) in &snapshot.values {
        if let Some(v) = value {
            if *v < 0.0 {
                return Err(AnalysisError::NegativeUsage {
                    metric: name.clone(),
                    value: *v,
                });
            }
        }
    }

    let mut line_items = Vec::with_capacity(specs.len());
    let mut total_cost = 0.0;
    let mut free_tier_savings = 0.0;

    for spec in *specs {
        let raw_usage =
            snapshot
                .metric(spec.metric)
                .ok_or_else(|| AnalysisError::IncompleteData {
                    service: snapshot.service,
                    missing: vec![spec.metric.to_string()],
                })?;

        let allowance = spec.free_tier.resolve(snapshot.period_days);
        let billable = (raw_usage - allowance).max(0.0);
        let cost = billable / spec.unit_size * spec.unit_price;

        total_cost += cost;
        free_tier_savings += raw_usage.min(allowance) / spec.unit_size * spec.unit_price;

        line_items.push(LineItem {
            component: spec.component.to_string(),
            raw_usage,
            free_tier_allowance: allowance,
            billable_usage: billable,
            unit_size: spec.unit_size,
            unit_price: spec.unit_price,
            cost,
        });
    }

    Ok(CostBreakdown {
        service: snapshot.service,
        line_items,
        total_cost,
        free_tier_savings,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn firestore_snapshot(period_days: u32, storage_bytes: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            project_id: "demo".to_string(),
            service: Service::Firestore,
            period_days,
            values: BTreeMap::from([
                (metrics::FIRESTORE_READS.to_string(), Some(69_852_686.0)),
                (metrics::FIRESTORE_WRITES.to_string(), Some(291_183.0)),
                (metrics::FIRESTORE_DELETES.to_string(), Some(15_218.0)),
                (
                    metrics::FIRESTORE_STORAGE_BYTES.to_string(),
                    Some(storage_bytes),
                ),
            ]),
        }
    }

    fn item<'a>(breakdown: &'a CostBreakdown, component: &str) -> &'a LineItem {
        breakdown
            .line_items
            .iter()
            .find(|i| i.component == component)
            .unwrap()
    }

    #[test]
    fn firestore_march_billing_reconciliation() {
        // 466.88 GiB stored, 31-day window; matches the source analysis that
        // reconciled against the invoice within $0.60.
        let snap = firestore_snapshot(31, 466.88 * GIB);
        let breakdown = calculate(&snap).unwrap();

        let reads = item(&breakdown, "document_reads");
        assert_eq!(reads.free_tier_allowance, 1_550_000.0);
        assert_eq!(reads.billable_usage, 68_302_686.0);
        assert!((reads.cost - 40.98).abs() < 0.01);

        let storage = item(&breakdown, "stored_data");
        assert!((storage.cost - 83.86).abs() < 0.01);

        assert_eq!(item(&breakdown, "document_writes").cost, 0.0);
        assert_eq!(item(&breakdown, "document_deletes").cost, 0.0);

        assert!((breakdown.total_cost - 124.84).abs() < 0.01);
    }

    #[test]
    fn total_is_exact_sum_of_line_items() {
        let breakdown = calculate(&firestore_snapshot(31, 466.88 * GIB)).unwrap();
        let sum: f64 = breakdown.line_items.iter().map(|i| i.cost).sum();
        assert_eq!(breakdown.total_cost, sum);
    }

    #[test]
    fn usage_at_exactly_the_allowance_costs_nothing() {
        let mut snap = firestore_snapshot(31, GIB);
        snap.values
            .insert(metrics::FIRESTORE_READS.to_string(), Some(1_550_000.0));
        let breakdown = calculate(&snap).unwrap();

        assert_eq!(item(&breakdown, "document_reads").billable_usage, 0.0);
        assert_eq!(item(&breakdown, "document_reads").cost, 0.0);
        assert_eq!(item(&breakdown, "stored_data").cost, 0.0);
    }

    #[test]
    fn count_allowances_scale_with_period_but_storage_does_not() {
        let short = calculate(&firestore_snapshot(1, 2.0 * GIB)).unwrap();
        let long = calculate(&firestore_snapshot(30, 2.0 * GIB)).unwrap();

        assert_eq!(item(&short, "document_reads").free_tier_allowance, 50_000.0);
        assert_eq!(
            item(&long, "document_reads").free_tier_allowance,
            1_500_000.0
        );

        // Storage is a gauge: the 1 GiB ceiling is flat, so the cost is
        // identical for a 1-day and a 30-day window.
        assert_eq!(item(&short, "stored_data").free_tier_allowance, GIB);
        assert_eq!(item(&long, "stored_data").free_tier_allowance, GIB);
        assert_eq!(
            item(&short, "stored_data").cost,
            item(&long, "stored_data").cost
        );
    }

    #[test]
    fn negative_usage_is_signaled_not_clamped() {
        let mut snap = firestore_snapshot(31, GIB);
        snap.values
            .insert(metrics::FIRESTORE_READS.to_string(), Some(-5.0));

        let err = calculate(&snap).unwrap_err();
        assert!(matches!(err, AnalysisError::NegativeUsage { .. }));
        assert!(err.to_string().contains("read_count"));
    }

    #[test]
    fn missing_priced_metric_is_incomplete_not_zero() {
        let mut snap = firestore_snapshot(31, GIB);
        snap.values.remove(metrics::FIRESTORE_STORAGE_BYTES);

        let err = calculate(&snap).unwrap_err();
        assert!(matches!(err, AnalysisError::IncompleteData { .. }));
    }

    #[test]
    fn free_tier_savings_count_what_the_grant_absorbed() {
        // All usage inside the free tier: cost 0, savings equal full price.
        let snap = MetricsSnapshot {
            project_id: "demo".to_string(),
            service: Service::Firestore,
            period_days: 10,
            values: BTreeMap::from([
                (metrics::FIRESTORE_READS.to_string(), Some(500_000.0)),
                (metrics::FIRESTORE_WRITES.to_string(), Some(0.0)),
                (metrics::FIRESTORE_DELETES.to_string(), Some(0.0)),
                (metrics::FIRESTORE_STORAGE_BYTES.to_string(), Some(0.0)),
            ]),
        };
        let breakdown = calculate(&snap).unwrap();

        assert_eq!(breakdown.total_cost, 0.0);
        // 500K reads at $0.06/100K
        assert!((breakdown.free_tier_savings - 0.30).abs() < 1e-9);
    }

    #[test]
    fn every_service_has_a_pricing_table() {
        for service in Service::ALL {
            assert!(PRICING.contains_key(&service), "{service} unpriced");
        }
    }

    #[test]
    fn cloud_run_free_grants_are_flat() {
        let snap = MetricsSnapshot {
            project_id: "demo".to_string(),
            service: Service::CloudRun,
            period_days: 31,
            values: BTreeMap::from([
                (metrics::RUN_REQUESTS.to_string(), Some(3_000_000.0)),
                (metrics::RUN_INSTANCES.to_string(), Some(2.0)),
                (metrics::RUN_CPU_SECONDS.to_string(), Some(180_000.0)),
            ]),
        };
        let breakdown = calculate(&snap).unwrap();

        // 1M billable requests at $0.40/M; vCPU time exactly at the grant.
        assert!((breakdown.total_cost - 0.40).abs() < 1e-9);
    }
}
