//! # Settings Cell
//!
//! Holds the current validated `ArgoAddon` spec. The settings reconciler is
//! the only writer; tenant passes take an immutable snapshot at their start.

use crate::crd::ArgoAddonSpec;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared handle to the current addon settings
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    current: Arc<RwLock<Option<Arc<ArgoAddonSpec>>>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, `None` until settings have been published
    pub fn get(&self) -> Option<Arc<ArgoAddonSpec>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot, returning the previous one
    pub fn update(&self, spec: ArgoAddonSpec) -> Option<Arc<ArgoAddonSpec>> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(Arc::new(spec))
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_snapshot() {
        let store = SettingsStore::new();
        assert!(!store.is_loaded());

        let first = ArgoAddonSpec::default();
        assert!(store.update(first.clone()).is_none());

        let snapshot = store.get().unwrap();

        let mut second = ArgoAddonSpec::default();
        second.argo.namespace = "gitops".to_string();
        let previous = store.update(second).unwrap();

        assert_eq!(*previous, first);
        assert_eq!(snapshot.argo.namespace, "argocd");
        assert_eq!(store.get().unwrap().argo.namespace, "gitops");
    }

    #[test]
    fn test_clones_share_state() {
        let store = SettingsStore::new();
        let reader = store.clone();
        store.update(ArgoAddonSpec::default());
        assert!(reader.is_loaded());
    }
}
