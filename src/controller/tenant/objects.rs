//! # Dependent Object Writes
//!
//! Read-modify-write helpers shared by the per-kind executors. Every write
//! re-reads the object inside [`retry_on_conflict`], so a conflict restarts
//! from the fresh state instead of replaying a stale computation.

use super::TenantScope;
use crate::controller::retry::retry_on_conflict;
use crate::controller::types::ReconcilerError;
use crate::meta::decouple_tenant;
use crate::observability::metrics;
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use kube::ResourceExt;
use tracing::{debug, warn};

/// Outcome of a write helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl OperationResult {
    fn action(self) -> Option<&'static str> {
        match self {
            Self::Created => Some("created"),
            Self::Updated => Some("updated"),
            Self::Unchanged => None,
        }
    }
}

/// Fetch a dependent, `None` when absent
pub async fn fetch<S, K>(scope: &TenantScope<'_, S>, key: &ObjectKey) -> Result<Option<K>, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject,
{
    scope.pass.run(scope.store.get::<K>(key)).await
}

/// Create the object at `key` or bring the stored one to the state `mutate` produces
///
/// Nothing is written when `mutate` leaves the stored object as it was.
pub async fn create_or_update<S, K, F>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
    mutate: F,
) -> Result<OperationResult, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject + Default,
    F: Fn(&mut K) -> Result<(), ReconcilerError> + Sync,
{
    write::<S, K, F>(scope, key, true, mutate).await
}

/// Apply `mutate` to the stored object; an absent object is left absent
pub async fn update_existing<S, K, F>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
    mutate: F,
) -> Result<OperationResult, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject + Default,
    F: Fn(&mut K) -> Result<(), ReconcilerError> + Sync,
{
    write::<S, K, F>(scope, key, false, mutate).await
}

async fn write<S, K, F>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
    create_missing: bool,
    mutate: F,
) -> Result<OperationResult, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject + Default,
    F: Fn(&mut K) -> Result<(), ReconcilerError> + Sync,
{
    let kind = K::kind(&());
    let operation = format!("write {kind} {key}");
    let mutate = &mutate;

    let result = retry_on_conflict(scope.pass, &operation, move || async move {
        let Some(current) = scope.pass.run(scope.store.get::<K>(key)).await? else {
            if !create_missing {
                return Ok(OperationResult::Unchanged);
            }
            let mut obj = K::default();
            obj.meta_mut().name = Some(key.name.clone());
            obj.meta_mut().namespace.clone_from(&key.namespace);
            mutate(&mut obj)?;
            scope.pass.run(scope.store.create(&obj)).await?;
            return Ok(OperationResult::Created);
        };

        let mut desired = current.clone();
        mutate(&mut desired)?;
        if serde_json::to_value(&desired)? == serde_json::to_value(&current)? {
            return Ok(OperationResult::Unchanged);
        }
        scope.pass.run(scope.store.replace(&desired)).await?;
        Ok(OperationResult::Updated)
    })
    .await?;

    if let Some(action) = result.action() {
        debug!(kind = %kind, object = %key, action, "dependent written");
        metrics::increment_dependent_operation(&kind, action);
    }
    Ok(result)
}

/// Strip the tenant's ownership markers from the object at `key`
pub async fn decouple<S, K>(scope: &TenantScope<'_, S>, key: &ObjectKey) -> Result<bool, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject + Default,
{
    let tenant = scope.tenant;
    let result = update_existing::<S, K, _>(scope, key, |obj: &mut K| {
        decouple_tenant(obj.meta_mut(), tenant);
        Ok(())
    })
    .await?;

    let decoupled = result == OperationResult::Updated;
    if decoupled {
        metrics::increment_dependent_operation(&K::kind(&()), "decoupled");
    }
    Ok(decoupled)
}

/// Delete the object at `key`; an absent object counts as deleted
pub async fn delete<S, K>(scope: &TenantScope<'_, S>, key: &ObjectKey) -> Result<bool, ReconcilerError>
where
    S: ObjectStore,
    K: StoreObject,
{
    let existed = scope.pass.run(scope.store.delete::<K>(key)).await?;
    if existed {
        let kind = K::kind(&());
        debug!(kind = %kind, object = %key, "dependent deleted");
        metrics::increment_dependent_operation(&kind, "deleted");
    }
    Ok(existed)
}

/// Report an object that blocks a dependent
pub fn ownership_conflict<S, K>(scope: &TenantScope<'_, S>, key: &ObjectKey) -> ReconcilerError
where
    S: ObjectStore,
    K: StoreObject,
{
    let kind = K::kind(&()).into_owned();
    let tenant = scope.tenant.name_any();
    warn!(
        kind = %kind,
        object = %key,
        tenant = %tenant,
        "⚠️  object already exists and is not owned by the tenant, not overriding"
    );
    metrics::increment_ownership_conflicts(&kind);
    ReconcilerError::ObjectAlreadyExists {
        kind,
        namespace: key.namespace.clone().unwrap_or_default(),
        name: key.name.clone(),
        tenant,
    }
}
