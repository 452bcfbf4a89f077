//! # Argo CD
//!
//! Helpers for Argo CD objects managed alongside tenants.
//!
//! - `destinations`: set semantics over `AppProject` destinations

pub mod destinations;

pub use destinations::{project_has_destination, remove_project_destination, ApplicationDestination};
