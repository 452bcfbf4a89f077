//! # Tenant Service Account
//!
//! The service account Argo CD authenticates as, its token secret, and the
//! owner principal entry granting it access to the tenant.

use super::decision::{decide, Decision};
use super::objects::{create_or_update, decouple, delete, fetch, ownership_conflict};
use super::owners::{add_owner, remove_owner};
use super::TenantScope;
use crate::constants::{
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_SECRET_TYPE, TOKEN_DATA_KEY,
};
use crate::controller::retry::poll_until;
use crate::controller::types::ReconcilerError;
use crate::meta::{service_account_owner, tracking_labels};
use crate::store::{ObjectKey, ObjectStore};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use tracing::{debug, info};

/// Reconcile the service account and its token
///
/// Returns the bearer token once the token controller has issued it. `None`
/// means there is no token to hand out this pass: the account was decoupled
/// or removed, or the token is not populated yet.
pub async fn reconcile_service_account<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
) -> Result<Option<String>, ReconcilerError> {
    let key = scope.service_account_key();
    debug!(service_account = %key, "reconciling service account");

    let existing = fetch::<S, ServiceAccount>(scope, &key).await?;
    match decide(
        existing.as_ref().map(|o| &o.metadata),
        scope.tenant,
        &scope.policy,
        scope.policy.proxy,
    ) {
        Decision::Skip => Ok(None),
        Decision::Decouple => {
            decouple::<S, ServiceAccount>(scope, &key).await?;
            decouple::<S, Secret>(scope, &key).await?;
            info!(service_account = %key, "decoupled service account");
            Ok(None)
        }
        Decision::Conflict => Err(ownership_conflict::<S, ServiceAccount>(scope, &key)),
        Decision::Remove => {
            remove(scope, &key).await?;
            Ok(None)
        }
        Decision::Converge => {
            converge(scope, &key).await?;
            reconcile_token(scope, &key).await
        }
    }
}

fn owner_principal(key: &ObjectKey) -> crate::crd::OwnerSpec {
    service_account_owner(key.namespace.as_deref().unwrap_or_default(), &key.name)
}

async fn remove<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
) -> Result<(), ReconcilerError> {
    remove_owner(scope.store, scope.pass, &scope.tenant_name, &owner_principal(key)).await?;

    // The token secret is owned by the tenant, not the account, so it is not
    // collected with the account
    let token = fetch::<S, Secret>(scope, key).await?;
    match decide(token.as_ref().map(|o| &o.metadata), scope.tenant, &scope.policy, false) {
        Decision::Conflict => return Err(ownership_conflict::<S, Secret>(scope, key)),
        Decision::Remove => {
            delete::<S, Secret>(scope, key).await?;
        }
        Decision::Skip | Decision::Decouple | Decision::Converge => {}
    }

    if delete::<S, ServiceAccount>(scope, key).await? {
        info!(service_account = %key, "removed service account");
    }
    Ok(())
}

async fn converge<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
) -> Result<(), ReconcilerError> {
    let tenant = scope.tenant;
    create_or_update::<S, ServiceAccount, _>(scope, key, |account: &mut ServiceAccount| {
        account.metadata.labels = Some(tracking_labels(tenant));
        scope.own(&mut account.metadata)
    })
    .await?;

    add_owner(scope.store, scope.pass, &scope.tenant_name, &owner_principal(key)).await?;
    Ok(())
}

async fn reconcile_token<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
    key: &ObjectKey,
) -> Result<Option<String>, ReconcilerError> {
    let existing = fetch::<S, Secret>(scope, key).await?;
    if decide(existing.as_ref().map(|o| &o.metadata), scope.tenant, &scope.policy, true)
        == Decision::Conflict
    {
        return Err(ownership_conflict::<S, Secret>(scope, key));
    }

    let tenant = scope.tenant;
    let account = key.name.as_str();
    create_or_update::<S, Secret, _>(scope, key, |secret: &mut Secret| {
        secret.metadata.labels = Some(tracking_labels(tenant));
        secret
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(), account.to_string());
        if secret.type_.is_none() {
            secret.type_ = Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE.to_string());
        }
        scope.own(&mut secret.metadata)
    })
    .await?;

    let token = poll_until(scope.pass, move || async move {
        let secret = fetch::<S, Secret>(scope, key).await?;
        Ok(secret.as_ref().and_then(token_of))
    })
    .await?;

    if token.is_none() {
        info!(secret = %key, "service account token not issued yet, deferring");
    }
    Ok(token)
}

/// Bearer token stored in a token secret, if populated
pub fn token_of(secret: &Secret) -> Option<String> {
    secret
        .data
        .as_ref()?
        .get(TOKEN_DATA_KEY)
        .map(|token| String::from_utf8_lossy(&token.0).into_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_token_of() {
        let mut secret = Secret::default();
        assert_eq!(token_of(&secret), None);

        secret.data = Some(BTreeMap::from([(
            TOKEN_DATA_KEY.to_string(),
            ByteString(Vec::new()),
        )]));
        assert_eq!(token_of(&secret), None);

        secret.data = Some(BTreeMap::from([(
            TOKEN_DATA_KEY.to_string(),
            ByteString(b"abc".to_vec()),
        )]));
        assert_eq!(token_of(&secret), Some("abc".to_string()));
    }
}
