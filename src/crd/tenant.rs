//! # Capsule Tenant
//!
//! Only `spec.owners` is modelled. Every other field of the tenant spec and of
//! each owner entry is carried verbatim so that writes never drop data managed
//! by Capsule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capsule Tenant (`capsule.clastix.io/v1beta2`)
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Tenant",
    group = "capsule.clastix.io",
    version = "v1beta2",
    shortname = "tnt"
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    /// Principals allowed to act as tenant owners
    #[serde(default)]
    pub owners: Vec<OwnerSpec>,
    /// Remaining tenant spec fields, preserved as-is
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A single tenant owner principal
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSpec {
    /// Principal kind (`User`, `Group` or `ServiceAccount`)
    pub kind: String,
    /// Fully qualified principal name
    pub name: String,
    /// Remaining owner fields (cluster roles, proxy settings)
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl OwnerSpec {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// Owners are identified by their `(kind, name)` pair only
    #[must_use]
    pub fn same_principal(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl TenantSpec {
    #[must_use]
    pub fn has_owner(&self, owner: &OwnerSpec) -> bool {
        self.owners.iter().any(|o| o.same_principal(owner))
    }
}
