//! Prometheus counters for thread operations.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: String,
    /// `ok` or the error code.
    pub outcome: String,
}

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    operations: Family<OperationLabels, Counter>,
    rejected_auth: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let operations = Family::<OperationLabels, Counter>::default();
        let rejected_auth = Counter::default();

        let mut registry = Registry::with_prefix("threads");
        registry.register(
            "operations",
            "Thread operations by name and outcome",
            operations.clone(),
        );
        registry.register(
            "rejected_credentials",
            "Requests refused for missing or invalid credentials",
            rejected_auth.clone(),
        );

        Self {
            registry: Arc::new(registry),
            operations,
            rejected_auth,
        }
    }

    pub fn record(&self, operation: &str, outcome: &str) {
        self.operations
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_rejected_credentials(&self) {
        self.rejected_auth.inc();
    }

    /// Current value of one series; unseen label pairs read as 0 and are not
    /// added to the exposition.
    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .get(&OperationLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .map_or(0, |counter| counter.get())
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}
