use thiserror::Error;

use crate::types::Service;

/// Failure taxonomy for a single service pipeline. One service failing must
/// never abort the pipelines of other services in the same batch run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Recoverable by the caller: re-fetch the window or drop this service
    /// from the run. Never substitute defaults for the named metrics.
    #[error("incomplete data for {service}: missing or null metrics: {}", .missing.join(", "))]
    IncompleteData {
        service: Service,
        missing: Vec<String>,
    },

    /// Configuration error: the tag has no registered pricing table.
    #[error("no pricing table registered for service `{0}`")]
    UnknownService(String),

    /// Signals an upstream data bug; usage counters can never go negative.
    #[error("negative usage for {metric}: {value}")]
    NegativeUsage { metric: String, value: f64 },

    /// The billing window covers less than one full day.
    #[error("analysis window must cover at least one full day, got {0}")]
    EmptyPeriod(i64),
}
