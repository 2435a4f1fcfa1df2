use crate::metrics::METRICS_PREFIX;
use const_format::concatcp;
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

const CLUSTER_METRICS_PREFIX: &str = concatcp!(METRICS_PREFIX, "clusters_");

lazy_static! {
    pub static ref CLUSTER_RECONCILE_COUNTER: CounterVec = register_counter_vec!(
        concatcp!(CLUSTER_METRICS_PREFIX, "reconcile_counter"),
        "Number of reconciliations by the Cluster controller.",
        &["name", "namespace"]
    )
    .unwrap();
    pub static ref CLUSTER_ACTION_COUNTER: CounterVec = register_counter_vec!(
        concatcp!(CLUSTER_METRICS_PREFIX, "action_counter"),
        "Number of actions taken by the Cluster controller.",
        &["name", "namespace", "action"]
    )
    .unwrap();
    pub static ref CLUSTER_RECONCILE_HISTOGRAM: HistogramVec = register_histogram_vec!(
        concatcp!(CLUSTER_METRICS_PREFIX, "reconcile_duration_seconds"),
        "Amount of time taken by one reconciliation of the Cluster controller.",
        &["name", "namespace", "action"]
    )
    .unwrap();
}
