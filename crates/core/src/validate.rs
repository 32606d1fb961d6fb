use crate::error::AnalysisError;
use crate::types::{metrics, MetricsSnapshot, Service};

/// Every metric the service's pricing table or detection rules consume.
/// The lists mirror what the fetch scripts collect per service.
pub fn required_metrics(service: Service) -> &'static [&'static str] {
    match service {
        Service::Firestore => &[
            metrics::FIRESTORE_READS,
            metrics::FIRESTORE_WRITES,
            metrics::FIRESTORE_DELETES,
            metrics::FIRESTORE_STORAGE_BYTES,
        ],
        Service::RealtimeDatabase => &[
            metrics::RTDB_SENT_BYTES,
            metrics::RTDB_STORAGE_BYTES,
            metrics::RTDB_API_HITS,
        ],
        Service::CloudFunctions => &[
            metrics::FUNCTIONS_EXECUTIONS,
            metrics::FUNCTIONS_EXECUTION_TIMES,
            metrics::FUNCTIONS_ACTIVE_INSTANCES,
            metrics::FUNCTIONS_MIN_INSTANCES,
        ],
        Service::Bigquery => &[
            metrics::BIGQUERY_STORED_BYTES,
            metrics::BIGQUERY_QUERY_COUNT,
            metrics::BIGQUERY_SCANNED_BYTES,
            metrics::BIGQUERY_TABLE_COUNT,
            metrics::BIGQUERY_PARTITION_EXPIRATION,
        ],
        Service::CloudStorage => &[
            metrics::STORAGE_TOTAL_BYTES,
            metrics::STORAGE_SENT_BYTES,
            metrics::STORAGE_REQUESTS,
            metrics::STORAGE_OBJECT_AGE_DAYS,
            metrics::STORAGE_STANDARD_CLASS,
            metrics::STORAGE_LIFECYCLE_RULES,
        ],
        Service::CloudRun => &[
            metrics::RUN_REQUESTS,
            metrics::RUN_INSTANCES,
            metrics::RUN_CPU_SECONDS,
        ],
    }
}

/// Gates the calculator and detector. Collects every missing or null metric
/// rather than stopping at the first, so one re-fetch can fix the whole
/// snapshot. A present zero is a legitimate observation and passes.
pub fn validate(snapshot: &MetricsSnapshot) -> Result<(), AnalysisError> {
    if snapshot.period_days < 1 {
        return Err(AnalysisError::EmptyPeriod(i64::from(snapshot.period_days)));
    }

    let mut missing: Vec<String> = Vec::new();
    for name in required_metrics(snapshot.service) {
        match snapshot.values.get(*name) {
            Some(Some(_)) => {}
            Some(None) | None => missing.push((*name).to_string()),
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::IncompleteData {
            service: snapshot.service,
            missing,
        })
    }
}
