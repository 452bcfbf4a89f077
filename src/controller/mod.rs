//! # Controller
//!
//! Reconciliation logic.
//!
//! - `tenant`: dependents of a Capsule tenant (service account, token, proxy service, cluster secret)
//! - `settings`: the `ArgoAddon` settings object
//! - `retry`: in-pass conflict retries, polling, cancellation
//! - `backoff`: error requeue backoff per tenant
//! - `server`: metrics and health HTTP server

pub mod backoff;
pub mod retry;
pub mod server;
pub mod settings;
pub mod tenant;
pub mod types;

pub use types::{Reconciler, ReconcilerError};
