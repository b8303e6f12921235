//! `AvailabilityPolicy` custom resource.

use super::class::{AvailabilityClass, ComponentFunction, EnforcementMode};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_GROUP: &str = "availability.oda.tmforum.org";
pub const POLICY_VERSION: &str = "v1alpha1";

/// Declares the availability expectations for a set of components.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "availability.oda.tmforum.org",
    version = "v1alpha1",
    kind = "AvailabilityPolicy",
    plural = "availabilitypolicies",
    shortname = "ap",
    namespaced,
    status = "AvailabilityPolicyStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPolicySpec {
    #[serde(alias = "availability_class")]
    pub availability_class: AvailabilityClass,

    #[serde(default)]
    pub enforcement: EnforcementMode,

    /// Higher wins when several policies apply.
    #[serde(default)]
    pub priority: i32,

    #[serde(default, alias = "component_selector")]
    pub component_selector: ComponentSelector,

    /// Required when `availability_class` is `custom`.
    #[serde(
        default,
        rename = "customPDBConfig",
        alias = "customPdbConfig",
        alias = "custom_pdb_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_pdb_config: Option<PdbConfig>,

    #[serde(
        default,
        alias = "maintenance_windows",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub maintenance_windows: Vec<MaintenanceWindow>,

    #[serde(default, alias = "minimum_class", skip_serializing_if = "Option::is_none")]
    pub minimum_class: Option<AvailabilityClass>,

    #[serde(default, alias = "allow_override", skip_serializing_if = "Option::is_none")]
    pub allow_override: Option<bool>,

    #[serde(
        default,
        alias = "override_requires_reason",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_requires_reason: Option<bool>,
}

impl AvailabilityPolicySpec {
    pub fn new(class: AvailabilityClass) -> Self {
        Self {
            availability_class: class,
            enforcement: EnforcementMode::default(),
            priority: 0,
            component_selector: ComponentSelector::default(),
            custom_pdb_config: None,
            maintenance_windows: Vec::new(),
            minimum_class: None,
            allow_override: None,
            override_requires_reason: None,
        }
    }

    /// Reject specs that cannot be enforced.
    pub fn validate(&self) -> Result<(), String> {
        if self.availability_class == AvailabilityClass::Custom {
            let Some(config) = &self.custom_pdb_config else {
                return Err("availability class 'custom' requires custom_pdb_config".to_string());
            };
            match (&config.min_available, &config.max_unavailable) {
                (None, None) => {
                    return Err(
                        "custom_pdb_config must set min_available or max_unavailable".to_string()
                    )
                }
                (Some(_), Some(_)) => {
                    return Err(
                        "custom_pdb_config cannot set both min_available and max_unavailable"
                            .to_string(),
                    )
                }
                _ => {}
            }
        }
        if let Some(min) = self.minimum_class {
            if let (Some(min), Some(actual)) = (min.order(), self.availability_class.order()) {
                if actual < min {
                    return Err(format!(
                        "availability class '{}' is below minimum class",
                        self.availability_class
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Which components a policy applies to.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSelector {
    #[serde(default, alias = "match_labels", skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Carried for round-tripping; not evaluated by the matchers.
    #[serde(
        default,
        alias = "match_expressions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub match_expressions: Vec<LabelSelectorRequirement>,

    #[serde(default, alias = "component_names", skip_serializing_if = "Vec::is_empty")]
    pub component_names: Vec<String>,

    #[serde(
        default,
        alias = "component_functions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub component_functions: Vec<ComponentFunction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
}

/// Explicit disruption budget for the `custom` class.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdbConfig {
    #[serde(default, alias = "min_available", skip_serializing_if = "Option::is_none")]
    pub min_available: Option<IntOrString>,

    #[serde(default, alias = "max_unavailable", skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,

    #[serde(
        default,
        alias = "unhealthy_pod_eviction_policy",
        skip_serializing_if = "Option::is_none"
    )]
    pub unhealthy_pod_eviction_policy: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, alias = "days_of_week", skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPolicyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_to_components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl AvailabilityPolicy {
    /// `namespace/name` key.
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }

    /// Strip server-assigned fields before create or update.
    pub fn clear_server_fields(&mut self) {
        self.metadata.resource_version = None;
        self.metadata.uid = None;
        self.metadata.generation = None;
        self.metadata.creation_timestamp = None;
        self.metadata.managed_fields = None;
        self.status = None;
    }

    /// Policy in `namespace` with the given spec.
    pub fn namespaced(namespace: &str, name: &str, spec: AvailabilityPolicySpec) -> Self {
        let mut policy = AvailabilityPolicy::new(name, spec);
        policy.metadata.namespace = Some(namespace.to_string());
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;
    use serde_json::json;

    #[test]
    fn test_crd_identity() {
        assert_eq!(AvailabilityPolicy::group(&()), POLICY_GROUP);
        assert_eq!(AvailabilityPolicy::version(&()), POLICY_VERSION);
        assert_eq!(AvailabilityPolicy::kind(&()), "AvailabilityPolicy");
        assert_eq!(AvailabilityPolicy::plural(&()), "availabilitypolicies");
    }

    #[test]
    fn test_spec_accepts_camel_and_snake_case() {
        let camel: AvailabilityPolicySpec = serde_json::from_value(json!({
            "availabilityClass": "high-availability",
            "enforcement": "flexible",
            "priority": 5,
            "componentSelector": {"matchLabels": {"tier": "gold"}, "componentNames": ["api"]}
        }))
        .unwrap();
        let snake: AvailabilityPolicySpec = serde_json::from_value(json!({
            "availability_class": "high-availability",
            "enforcement": "flexible",
            "priority": 5,
            "component_selector": {"match_labels": {"tier": "gold"}, "component_names": ["api"]}
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.component_selector.match_labels["tier"], "gold");
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let mut spec = AvailabilityPolicySpec::new(AvailabilityClass::Custom);
        spec.custom_pdb_config = Some(PdbConfig {
            min_available: Some(IntOrString::Int(2)),
            ..Default::default()
        });
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["availabilityClass"], "custom");
        assert_eq!(value["enforcement"], "strict");
        assert_eq!(value["customPDBConfig"]["minAvailable"], 2);
        assert!(value.get("maintenanceWindows").is_none());
    }

    #[test]
    fn test_custom_class_requires_config() {
        let spec = AvailabilityPolicySpec::new(AvailabilityClass::Custom);
        assert!(spec.validate().unwrap_err().contains("custom_pdb_config"));

        let mut spec = spec;
        spec.custom_pdb_config = Some(PdbConfig::default());
        assert!(spec.validate().is_err());

        spec.custom_pdb_config = Some(PdbConfig {
            max_unavailable: Some(IntOrString::String("25%".into())),
            ..Default::default()
        });
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_minimum_class_enforced() {
        let mut spec = AvailabilityPolicySpec::new(AvailabilityClass::Standard);
        spec.minimum_class = Some(AvailabilityClass::HighAvailability);
        assert!(spec.validate().is_err());
        spec.availability_class = AvailabilityClass::MissionCritical;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_clear_server_fields() {
        let mut policy =
            AvailabilityPolicy::namespaced("prod", "p", AvailabilityPolicySpec::new(AvailabilityClass::Standard));
        policy.metadata.resource_version = Some("12".into());
        policy.metadata.uid = Some("abc".into());
        policy.metadata.generation = Some(3);
        policy.status = Some(AvailabilityPolicyStatus::default());

        policy.clear_server_fields();
        assert!(policy.metadata.resource_version.is_none());
        assert!(policy.metadata.uid.is_none());
        assert!(policy.metadata.generation.is_none());
        assert!(policy.status.is_none());
        assert_eq!(policy.key(), "prod/p");
    }
}
