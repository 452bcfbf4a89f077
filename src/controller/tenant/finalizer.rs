//! # Tenant Finalizer
//!
//! Live tenants carry [`TENANT_FINALIZER`] so that their deletion waits for a
//! pass that can decouple dependents.

use crate::constants::TENANT_FINALIZER;
use crate::controller::retry::{retry_on_conflict, PassContext};
use crate::controller::types::ReconcilerError;
use crate::crd::Tenant;
use crate::store::{ObjectKey, ObjectStore};
use kube::ResourceExt;
use tracing::debug;

pub fn has_finalizer(tenant: &Tenant) -> bool {
    tenant.finalizers().iter().any(|f| f == TENANT_FINALIZER)
}

/// Make sure the stored tenant carries the finalizer
///
/// Returns the current tenant, or `None` when it no longer exists.
pub async fn ensure_finalizer<S: ObjectStore>(
    store: &S,
    pass: &PassContext,
    tenant: &str,
) -> Result<Option<Tenant>, ReconcilerError> {
    let key = ObjectKey::cluster(tenant);
    let key = &key;
    retry_on_conflict(pass, "add tenant finalizer", move || async move {
        let Some(mut current) = pass.run(store.get::<Tenant>(key)).await? else {
            return Ok(None);
        };
        if has_finalizer(&current) {
            return Ok(Some(current));
        }

        debug!(tenant, "adding finalizer");
        current.finalizers_mut().push(TENANT_FINALIZER.to_string());
        pass.run(store.replace(&current)).await.map(Some)
    })
    .await
}

/// Release the tenant by dropping the finalizer
///
/// Returns whether the tenant was written.
pub async fn remove_finalizer<S: ObjectStore>(
    store: &S,
    pass: &PassContext,
    tenant: &str,
) -> Result<bool, ReconcilerError> {
    let key = ObjectKey::cluster(tenant);
    let key = &key;
    retry_on_conflict(pass, "remove tenant finalizer", move || async move {
        let Some(mut current) = pass.run(store.get::<Tenant>(key)).await? else {
            return Ok(false);
        };
        if !has_finalizer(&current) {
            return Ok(false);
        }

        debug!(tenant, "removing finalizer");
        current.finalizers_mut().retain(|f| f != TENANT_FINALIZER);
        pass.run(store.replace(&current)).await?;
        Ok(true)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::retry::RetryPolicy;
    use crate::crd::TenantSpec;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn pass() -> PassContext {
        PassContext::new(
            &CancellationToken::new(),
            Duration::from_secs(5),
            RetryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_finalizer_round_trip() {
        let store = MemoryStore::new();
        store
            .create(&Tenant::new("acme", TenantSpec::default()))
            .await
            .unwrap();

        let tenant = ensure_finalizer(&store, &pass(), "acme").await.unwrap().unwrap();
        assert!(has_finalizer(&tenant));

        let writes = store.writes();
        ensure_finalizer(&store, &pass(), "acme").await.unwrap();
        assert_eq!(store.writes(), writes);

        assert!(remove_finalizer(&store, &pass(), "acme").await.unwrap());
        assert!(!remove_finalizer(&store, &pass(), "acme").await.unwrap());
    }

    #[tokio::test]
    async fn test_releasing_a_deleting_tenant_removes_it() {
        let store = MemoryStore::new();
        store
            .create(&Tenant::new("acme", TenantSpec::default()))
            .await
            .unwrap();
        ensure_finalizer(&store, &pass(), "acme").await.unwrap();

        store.delete::<Tenant>(&ObjectKey::cluster("acme")).await.unwrap();
        assert!(store
            .get::<Tenant>(&ObjectKey::cluster("acme"))
            .await
            .unwrap()
            .is_some());

        remove_finalizer(&store, &pass(), "acme").await.unwrap();
        assert!(store
            .get::<Tenant>(&ObjectKey::cluster("acme"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_tenant() {
        let store = MemoryStore::new();
        assert!(ensure_finalizer(&store, &pass(), "acme").await.unwrap().is_none());
    }
}
