use crate::metrics::METRICS_PREFIX;
use const_format::concatcp;
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

const ACCESS_METRICS_PREFIX: &str = concatcp!(METRICS_PREFIX, "accessrequests_");

lazy_static! {
    pub static ref ACCESS_RECONCILE_COUNTER: CounterVec = register_counter_vec!(
        concatcp!(ACCESS_METRICS_PREFIX, "reconcile_counter"),
        "Number of reconciliations by the AccessRequest controller.",
        &["name", "namespace"]
    )
    .unwrap();
    pub static ref ACCESS_ACTION_COUNTER: CounterVec = register_counter_vec!(
        concatcp!(ACCESS_METRICS_PREFIX, "action_counter"),
        "Number of actions taken by the AccessRequest controller.",
        &["name", "namespace", "action"]
    )
    .unwrap();
    pub static ref ACCESS_RECONCILE_HISTOGRAM: HistogramVec = register_histogram_vec!(
        concatcp!(ACCESS_METRICS_PREFIX, "reconcile_duration_seconds"),
        "Amount of time taken by one reconciliation of the AccessRequest controller.",
        &["name", "namespace", "action"]
    )
    .unwrap();
}
