use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Firestore,
    RealtimeDatabase,
    CloudFunctions,
    Bigquery,
    CloudStorage,
    CloudRun,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Firestore,
        Service::RealtimeDatabase,
        Service::CloudFunctions,
        Service::Bigquery,
        Service::CloudStorage,
        Service::CloudRun,
    ];

    /// Accepts the canonical tag plus the aliases the fetch scripts emit.
    pub fn parse(tag: &str) -> Result<Self, AnalysisError> {
        match tag {
            "firestore" => Ok(Service::Firestore),
            "realtime_database" | "rtdb" | "realtime-db" | "firebase-db" => {
                Ok(Service::RealtimeDatabase)
            }
            "cloud_functions" | "functions" | "cloud-functions" => Ok(Service::CloudFunctions),
            "bigquery" => Ok(Service::Bigquery),
            "cloud_storage" | "storage" => Ok(Service::CloudStorage),
            "cloud_run" | "cloudrun" => Ok(Service::CloudRun),
            other => Err(AnalysisError::UnknownService(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Firestore => "firestore",
            Service::RealtimeDatabase => "realtime_database",
            Service::CloudFunctions => "cloud_functions",
            Service::Bigquery => "bigquery",
            Service::CloudStorage => "cloud_storage",
            Service::CloudRun => "cloud_run",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified Cloud Monitoring metric names as written by the fetch
/// scripts into `*_metrics.json`.
pub mod metrics {
    pub const FIRESTORE_READS: &str = "firestore.googleapis.com/document/read_count";
    pub const FIRESTORE_WRITES: &str = "firestore.googleapis.com/document/write_count";
    pub const FIRESTORE_DELETES: &str = "firestore.googleapis.com/document/delete_count";
    pub const FIRESTORE_STORAGE_BYTES: &str = "firestore.googleapis.com/storage/total_bytes";

    pub const RTDB_SENT_BYTES: &str = "firebasedatabase.googleapis.com/network/monthly_sent";
    pub const RTDB_STORAGE_BYTES: &str = "firebasedatabase.googleapis.com/storage/total_bytes";
    pub const RTDB_API_HITS: &str = "firebasedatabase.googleapis.com/network/api_hits_count";

    pub const FUNCTIONS_EXECUTIONS: &str =
        "cloudfunctions.googleapis.com/function/execution_count";
    pub const FUNCTIONS_EXECUTION_TIMES: &str =
        "cloudfunctions.googleapis.com/function/execution_times";
    pub const FUNCTIONS_ACTIVE_INSTANCES: &str =
        "cloudfunctions.googleapis.com/function/active_instances";
    pub const FUNCTIONS_MIN_INSTANCES: &str =
        "cloudfunctions.googleapis.com/function/min_instances";

    pub const BIGQUERY_STORED_BYTES: &str = "bigquery.googleapis.com/storage/stored_bytes";
    pub const BIGQUERY_QUERY_COUNT: &str = "bigquery.googleapis.com/query/count";
    pub const BIGQUERY_SCANNED_BYTES: &str = "bigquery.googleapis.com/query/scanned_bytes";
    pub const BIGQUERY_TABLE_COUNT: &str = "bigquery.googleapis.com/dataset/table_count";
    pub const BIGQUERY_PARTITION_EXPIRATION: &str =
        "bigquery.googleapis.com/dataset/partition_expiration_configured";

    pub const STORAGE_TOTAL_BYTES: &str = "storage.googleapis.com/storage/total_bytes";
    pub const STORAGE_SENT_BYTES: &str = "storage.googleapis.com/network/sent_bytes_count";
    pub const STORAGE_REQUESTS: &str = "storage.googleapis.com/api/request_count";
    pub const STORAGE_OBJECT_AGE_DAYS: &str = "storage.googleapis.com/object/avg_age_days";
    pub const STORAGE_STANDARD_CLASS: &str = "storage.googleapis.com/bucket/standard_class";
    pub const STORAGE_LIFECYCLE_RULES: &str =
        "storage.googleapis.com/bucket/lifecycle_rule_count";

    pub const RUN_REQUESTS: &str = "run.googleapis.com/request_count";
    pub const RUN_INSTANCES: &str = "run.googleapis.com/container/instance_count";
    pub const RUN_CPU_SECONDS: &str = "run.googleapis.com/container/billable_instance_time";
}

/// Raw counter/gauge values for one service over one billing window.
///
/// `None` is the explicit "missing" marker for a metric the upstream API
/// failed to resolve; an absent key means the same thing. A literal zero is
/// a real observation and is never treated as missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub project_id: String,
    pub service: Service,
    pub period_days: u32,
    pub values: BTreeMap<String, Option<f64>>,
}

impl MetricsSnapshot {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    BigquerySprawl,
    DbOverReading,
    FunctionsAlwaysOn,
    RtdbOverDownloading,
    StorageClassInefficiency,
}

impl PatternId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternId::BigquerySprawl => "bigquery_sprawl",
            PatternId::DbOverReading => "db_over_reading",
            PatternId::FunctionsAlwaysOn => "functions_always_on",
            PatternId::RtdbOverDownloading => "rtdb_over_downloading",
            PatternId::StorageClassInefficiency => "storage_class_inefficiency",
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The literal values that made a pattern fire, kept for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub metrics: BTreeMap<String, f64>,
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SavingsRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub pattern_id: PatternId,
    pub severity: Severity,
    pub confidence: ConfidenceLevel,
    pub evidence: Evidence,
    pub likely_cause: String,
    pub suggested_actions: Vec<String>,
    pub estimated_savings_pct: SavingsRange,
    pub estimated_savings_usd: Option<SavingsRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_parse_accepts_fetch_script_aliases() {
        assert_eq!(Service::parse("rtdb").unwrap(), Service::RealtimeDatabase);
        assert_eq!(
            Service::parse("firebase-db").unwrap(),
            Service::RealtimeDatabase
        );
        assert_eq!(
            Service::parse("functions").unwrap(),
            Service::CloudFunctions
        );
        assert_eq!(Service::parse("storage").unwrap(), Service::CloudStorage);
        assert_eq!(Service::parse("cloudrun").unwrap(), Service::CloudRun);
    }

    #[test]
    fn service_parse_rejects_unknown_tag() {
        let err = Service::parse("spanner").unwrap_err();
        assert!(err.to_string().contains("spanner"));
    }

    #[test]
    fn zero_metric_is_present_not_missing() {
        let mut values = BTreeMap::new();
        values.insert(metrics::FIRESTORE_READS.to_string(), Some(0.0));
        values.insert(metrics::FIRESTORE_WRITES.to_string(), None);
        let snap = MetricsSnapshot {
            project_id: "p".to_string(),
            service: Service::Firestore,
            period_days: 30,
            values,
        };

        assert_eq!(snap.metric(metrics::FIRESTORE_READS), Some(0.0));
        assert_eq!(snap.metric(metrics::FIRESTORE_WRITES), None);
        assert_eq!(snap.metric(metrics::FIRESTORE_DELETES), None);
    }
}
