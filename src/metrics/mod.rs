//! Prometheus metrics for indexing and search

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};

/// Engine metrics
pub struct EngineMetrics {
    /// Change events consumed, by change type
    pub events_consumed: CounterVec,

    /// Events dropped after the visibility-retry bound
    pub events_dropped: IntCounter,

    /// Resolution retries for not-yet-visible objects
    pub visibility_retries: IntCounter,

    /// Batches requeued after an apply failure
    pub batches_requeued: IntCounter,

    /// Batches parked on the dead-letter queue
    pub batches_dead_lettered: IntCounter,

    /// Documents indexed, by content kind
    pub documents_indexed: CounterVec,

    /// Documents removed, by content kind
    pub documents_removed: CounterVec,

    /// Search latency in seconds
    pub search_latency: HistogramVec,
}

lazy_static! {
    pub static ref ENGINE_METRICS: EngineMetrics = EngineMetrics {
        events_consumed: register_counter_vec!(
            "cse_events_consumed_total",
            "Total number of change events consumed",
            &["change_type"]
        )
        .unwrap(),

        events_dropped: register_int_counter!(
            "cse_events_dropped_total",
            "Events dropped after exhausting visibility retries"
        )
        .unwrap(),

        visibility_retries: register_int_counter!(
            "cse_visibility_retries_total",
            "Retries against not-yet-visible content objects"
        )
        .unwrap(),

        batches_requeued: register_int_counter!(
            "cse_batches_requeued_total",
            "Event batches requeued after an apply failure"
        )
        .unwrap(),

        batches_dead_lettered: register_int_counter!(
            "cse_batches_dead_lettered_total",
            "Event batches parked on the dead-letter queue"
        )
        .unwrap(),

        documents_indexed: register_counter_vec!(
            "cse_documents_indexed_total",
            "Documents indexed into catalogs",
            &["content_kind"]
        )
        .unwrap(),

        documents_removed: register_counter_vec!(
            "cse_documents_removed_total",
            "Documents removed from catalogs",
            &["content_kind"]
        )
        .unwrap(),

        search_latency: register_histogram_vec!(
            "cse_search_latency_seconds",
            "Search latency in seconds",
            &["entity_kind"]
        )
        .unwrap(),
    };
}

/// Initialize engine metrics
pub fn init_metrics() {
    lazy_static::initialize(&ENGINE_METRICS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        init_metrics();
        ENGINE_METRICS
            .events_consumed
            .with_label_values(&["created"])
            .inc();
        ENGINE_METRICS.events_dropped.inc();
    }
}
