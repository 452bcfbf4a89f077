//! # Project Destinations
//!
//! Destinations of an Argo CD `AppProject` behave as a set keyed on the full
//! `(name, namespace, server)` triple. Matching is exact string equality.

use serde::{Deserialize, Serialize};

/// A single `AppProject` destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    /// Name of the destination cluster (alternative to server)
    #[serde(default)]
    pub name: String,
    /// Target namespace, `*` for all namespaces
    #[serde(default)]
    pub namespace: String,
    /// URL of the destination cluster API server
    #[serde(default)]
    pub server: String,
}

impl ApplicationDestination {
    pub fn new(name: &str, namespace: &str, server: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            server: server.to_string(),
        }
    }

    fn same_as(&self, other: &Self) -> bool {
        self.name == other.name && self.namespace == other.namespace && self.server == other.server
    }
}

/// Check whether the destination list already holds `candidate`
#[must_use]
pub fn project_has_destination(
    destinations: &[ApplicationDestination],
    candidate: &ApplicationDestination,
) -> bool {
    destinations.iter().any(|d| d.same_as(candidate))
}

/// Return the destination list without any entry equal to `candidate`
///
/// Removing a destination that is not present returns the list unchanged.
#[must_use]
pub fn remove_project_destination(
    destinations: &[ApplicationDestination],
    candidate: &ApplicationDestination,
) -> Vec<ApplicationDestination> {
    destinations
        .iter()
        .filter(|d| !d.same_as(candidate))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destinations() -> Vec<ApplicationDestination> {
        vec![
            ApplicationDestination::new("acme", "acme-prod", "https://acme.capsule-system.svc:9001"),
            ApplicationDestination::new("acme", "acme-dev", "https://acme.capsule-system.svc:9001"),
            ApplicationDestination::new("in-cluster", "*", "https://kubernetes.default.svc"),
        ]
    }

    #[test]
    fn test_contains_requires_all_three_fields() {
        let set = destinations();
        assert!(project_has_destination(
            &set,
            &ApplicationDestination::new("acme", "acme-dev", "https://acme.capsule-system.svc:9001")
        ));
        assert!(!project_has_destination(
            &set,
            &ApplicationDestination::new("acme", "acme-dev", "https://other.svc:9001")
        ));
        assert!(!project_has_destination(
            &set,
            &ApplicationDestination::new("ACME", "acme-dev", "https://acme.capsule-system.svc:9001")
        ));
    }

    #[test]
    fn test_remove_present_destination() {
        let set = destinations();
        let target = ApplicationDestination::new("in-cluster", "*", "https://kubernetes.default.svc");

        let remaining = remove_project_destination(&set, &target);

        assert_eq!(remaining.len(), 2);
        assert!(!project_has_destination(&remaining, &target));
        assert_eq!(remaining[0].namespace, "acme-prod");
        assert_eq!(remaining[1].namespace, "acme-dev");
    }

    #[test]
    fn test_remove_absent_destination_is_noop() {
        let set = destinations();
        let absent = ApplicationDestination::new("nobody", "nowhere", "https://void");

        let remaining = remove_project_destination(&set, &absent);

        assert_eq!(remaining, set);
        for dest in &set {
            assert!(project_has_destination(&remaining, dest));
        }
    }

    #[test]
    fn test_remove_drops_duplicates() {
        let mut set = destinations();
        set.push(set[0].clone());

        let remaining = remove_project_destination(&set, &set[0].clone());

        assert_eq!(remaining.len(), 2);
    }
}
