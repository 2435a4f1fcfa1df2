mod actions;
mod reconcile;

#[cfg(feature = "metrics")]
mod metrics;

pub use actions::kind_name;
pub use reconcile::{on_error, reconcile, run, ContextData};
