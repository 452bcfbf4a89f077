//! Capsule Argo CD Addon
//!
//! Registers every Capsule tenant as an Argo CD cluster reached through
//! capsule-proxy. For each tenant the controller maintains a service account
//! and its token, a proxy service and an Argo CD cluster secret, driven by
//! the cluster-wide `ArgoAddon` settings and per-tenant annotations.
//!
//! ## Quick Start
//!
//! ```rust
//! use capsule_argo_addon::prelude::*;
//! ```

pub mod argo;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod diff;
pub mod meta;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
