//! Custom resources managed by the kind cluster provider.

mod access;
mod cluster;
mod condition;

pub mod patch;

pub use access::*;
pub use cluster::*;
pub use condition::*;
