//! # Custom Resource Definitions
//!
//! - `addon`: the cluster-scoped `ArgoAddon` settings resource served by this controller
//! - `tenant`: the subset of the Capsule `Tenant` this controller reads and writes

mod addon;
mod tenant;

pub use addon::*;
pub use tenant::*;
