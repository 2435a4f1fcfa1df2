mod actions;
mod reconcile;

#[cfg(feature = "metrics")]
mod metrics;

pub use actions::KUBECONFIG_KEY;
pub use reconcile::{on_error, reconcile, run, ContextData};
