//! # Types
//!
//! Reconciler context and error taxonomy.

use crate::config::{ControllerConfig, SettingsStore};
use crate::controller::backoff::BackoffState;
use crate::controller::retry::{PassContext, RetryPolicy};
use crate::controller::settings::{SettingsValidator, StructuralValidator};
use crate::store::{ObjectStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("{kind} {namespace}/{name} already exists and is not owned by tenant {tenant}")]
    ObjectAlreadyExists {
        kind: String,
        namespace: String,
        name: String,
        tenant: String,
    },
    #[error("{operation} still conflicting after {attempts} attempts")]
    RetryExhausted { operation: String, attempts: u32 },
    #[error("reconciliation cancelled")]
    Cancelled,
    #[error("reconciliation exceeded its deadline")]
    Timeout,
    #[error("addon settings have not been loaded")]
    SettingsNotLoaded,
    #[error("invalid addon settings: {0}")]
    InvalidSettings(String),
    #[error("capsule-proxy service {namespace}/{name} not found")]
    ProxyServiceUnresolved { namespace: String, name: String },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0} has no uid")]
    MissingUid(String),
}

impl ReconcilerError {
    /// Version conflicts, including a create racing another create
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Conflict | StoreError::AlreadyExists)
        )
    }

    /// Low-cardinality label for error metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Conflict) | Self::RetryExhausted { .. } => "conflict",
            Self::Store(_) => "store",
            Self::ObjectAlreadyExists { .. } => "ownership",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::SettingsNotLoaded | Self::InvalidSettings(_) => "settings",
            Self::ProxyServiceUnresolved { .. } => "proxy",
            Self::Serialization(_) | Self::MissingUid(_) => "internal",
        }
    }
}

/// Shared context of the tenant and settings reconcilers
pub struct Reconciler<S> {
    pub store: S,
    pub settings: SettingsStore,
    pub config: Arc<ControllerConfig>,
    pub validator: Arc<dyn SettingsValidator>,
    /// Parent of every pass token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// Error backoff per tenant name
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl<S> std::fmt::Debug for Reconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, settings: SettingsStore, config: ControllerConfig) -> Self {
        Self {
            store,
            settings,
            config: Arc::new(config),
            validator: Arc::new(StructuralValidator),
            shutdown: CancellationToken::new(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SettingsValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(self.config.as_ref())
    }

    /// Fresh cancellation and deadline scope for one pass
    pub fn pass(&self) -> PassContext {
        PassContext::new(
            &self.shutdown,
            self.config.reconcile_timeout(),
            self.retry_policy(),
        )
    }

    /// Count a failure for `name` and return the requeue delay
    pub fn record_error(&self, name: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(name.to_string()).or_insert_with(|| {
            BackoffState::new(
                self.config.error_backoff_min_minutes,
                self.config.error_backoff_max_minutes,
            )
        });
        let delay = state.record_error();
        (delay, state.error_count)
    }

    /// Forget the error backoff of `name` after a successful pass
    pub fn reset_backoff(&self, name: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}
