//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use capsule_argo_addon::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler context and entry points
pub use crate::controller::settings::{SettingsValidator, StructuralValidator};
pub use crate::controller::{Reconciler, ReconcilerError};

// Object access
pub use crate::store::{KubeStore, MemoryStore, ObjectKey, ObjectStore, StoreError, StoreObject};

// Configuration
pub use crate::config::{ControllerConfig, SettingsStore};

// Helpers
pub use crate::argo::ApplicationDestination;
pub use crate::diff::Subtract;
pub use crate::meta::TenantPolicy;
