//! # Settings Validation

use crate::controller::types::ReconcilerError;
use crate::crd::ArgoAddonSpec;

/// Checks a settings candidate before it is published
pub trait SettingsValidator: Send + Sync + std::fmt::Debug {
    fn validate(&self, spec: &ArgoAddonSpec) -> Result<(), ReconcilerError>;
}

/// Rejects settings the tenant reconciler cannot act on
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl SettingsValidator for StructuralValidator {
    fn validate(&self, spec: &ArgoAddonSpec) -> Result<(), ReconcilerError> {
        let required = [
            ("argo.namespace", &spec.argo.namespace),
            (
                "proxy.serviceAccountNamespace",
                &spec.proxy.service_account_namespace,
            ),
            (
                "proxy.capsuleProxyServiceName",
                &spec.proxy.capsule_proxy_service_name,
            ),
            (
                "proxy.capsuleProxyServiceNamespace",
                &spec.proxy.capsule_proxy_service_namespace,
            ),
        ];

        let empty: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if !empty.is_empty() {
            return Err(ReconcilerError::InvalidSettings(format!(
                "empty fields: {}",
                empty.join(", ")
            )));
        }

        if spec.proxy.capsule_proxy_service_port == 0 {
            return Err(ReconcilerError::InvalidSettings(
                "proxy.capsuleProxyServicePort must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StructuralValidator
            .validate(&ArgoAddonSpec::default())
            .is_ok());
    }

    #[test]
    fn test_empty_fields_are_listed() {
        let mut spec = ArgoAddonSpec::default();
        spec.argo.namespace = String::new();
        spec.proxy.capsule_proxy_service_name = " ".to_string();

        let Err(ReconcilerError::InvalidSettings(message)) = StructuralValidator.validate(&spec)
        else {
            panic!("expected invalid settings");
        };
        assert!(message.contains("argo.namespace"));
        assert!(message.contains("proxy.capsuleProxyServiceName"));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let mut spec = ArgoAddonSpec::default();
        spec.proxy.capsule_proxy_service_port = 0;
        assert!(matches!(
            StructuralValidator.validate(&spec),
            Err(ReconcilerError::InvalidSettings(_))
        ));
    }
}
