//! # Dependent Decision
//!
//! Pure choice of what a pass does with one dependent object.

use crate::crd::Tenant;
use crate::meta::{has_tenant_owner_reference, is_deleting, TenantPolicy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Action a pass takes for one dependent object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Strip the tenant owner reference and tracking labels, keep the object
    Decouple,
    /// Nothing to do: the tenant is going away and there is nothing to decouple
    Skip,
    /// The object belongs to someone else and adoption is not allowed
    Conflict,
    /// The dependent kind is disabled: remove the object
    Remove,
    /// Create or update the object to its desired state
    Converge,
}

/// Decide the fate of a dependent object
///
/// `existing` is the metadata of the object currently stored under the
/// dependent's name, `enabled` whether the dependent kind is switched on for
/// the tenant.
pub fn decide(
    existing: Option<&ObjectMeta>,
    tenant: &Tenant,
    policy: &TenantPolicy,
    enabled: bool,
) -> Decision {
    if is_deleting(&tenant.metadata) && policy.decouple {
        return match existing {
            Some(_) => Decision::Decouple,
            None => Decision::Skip,
        };
    }

    if let Some(meta) = existing {
        if !has_tenant_owner_reference(meta, tenant) && !policy.force {
            return Decision::Conflict;
        }
    }

    if enabled {
        Decision::Converge
    } else {
        Decision::Remove
    }
}
