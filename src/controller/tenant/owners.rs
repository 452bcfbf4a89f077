//! # Tenant Owner Principals
//!
//! Adds and removes an owner principal on a tenant. Each attempt re-reads the
//! tenant and re-checks membership before mutating, so a lost race against
//! another writer is resolved against the fresh list.

use crate::controller::retry::{retry_on_conflict, PassContext};
use crate::controller::types::ReconcilerError;
use crate::crd::{OwnerSpec, Tenant};
use crate::store::{ObjectKey, ObjectStore};
use tracing::debug;

/// Append `owner` to the tenant's owner list unless an equal principal is listed
///
/// Returns whether the tenant was written. A tenant that no longer exists is
/// left alone.
pub async fn add_owner<S: ObjectStore>(
    store: &S,
    pass: &PassContext,
    tenant: &str,
    owner: &OwnerSpec,
) -> Result<bool, ReconcilerError> {
    let key = ObjectKey::cluster(tenant);
    let key = &key;
    retry_on_conflict(pass, "add tenant owner", move || async move {
        let Some(mut current) = pass.run(store.get::<Tenant>(key)).await? else {
            return Ok(false);
        };
        if current.spec.has_owner(owner) {
            debug!(tenant, owner = %owner.name, "principal already owner");
            return Ok(false);
        }

        debug!(tenant, owner = %owner.name, "adding principal as owner");
        current.spec.owners.push(owner.clone());
        pass.run(store.replace(&current)).await?;
        Ok(true)
    })
    .await
}

/// Drop every entry equal to `owner` from the tenant's owner list
///
/// Returns whether the tenant was written.
pub async fn remove_owner<S: ObjectStore>(
    store: &S,
    pass: &PassContext,
    tenant: &str,
    owner: &OwnerSpec,
) -> Result<bool, ReconcilerError> {
    let key = ObjectKey::cluster(tenant);
    let key = &key;
    retry_on_conflict(pass, "remove tenant owner", move || async move {
        let Some(mut current) = pass.run(store.get::<Tenant>(key)).await? else {
            return Ok(false);
        };
        if !current.spec.has_owner(owner) {
            return Ok(false);
        }

        debug!(tenant, owner = %owner.name, "removing principal as owner");
        current.spec.owners.retain(|o| !o.same_principal(owner));
        pass.run(store.replace(&current)).await?;
        Ok(true)
    })
    .await
}
