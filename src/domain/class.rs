//! Availability classes, enforcement modes and component functions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Annotation carrying a deployment's declared availability class.
pub const AVAILABILITY_CLASS_ANNOTATION: &str = "oda.tmforum.org/availability-class";

/// Annotation carrying a deployment's component function.
pub const COMPONENT_FUNCTION_ANNOTATION: &str = "oda.tmforum.org/component-function";

/// Prefix of annotations validated by `update_deployment_annotations`.
pub const ODA_ANNOTATION_PREFIX: &str = "oda.tmforum.org/";

/// Ordered availability label. `Custom` sits outside the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityClass {
    NonCritical,
    Standard,
    HighAvailability,
    MissionCritical,
    Custom,
}

impl AvailabilityClass {
    /// Classes that carry a canonical PDB default, weakest first.
    pub const ORDERED: [AvailabilityClass; 4] = [
        AvailabilityClass::NonCritical,
        AvailabilityClass::Standard,
        AvailabilityClass::HighAvailability,
        AvailabilityClass::MissionCritical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityClass::NonCritical => "non-critical",
            AvailabilityClass::Standard => "standard",
            AvailabilityClass::HighAvailability => "high-availability",
            AvailabilityClass::MissionCritical => "mission-critical",
            AvailabilityClass::Custom => "custom",
        }
    }

    /// Position in the total order, `None` for `Custom`.
    pub fn order(&self) -> Option<i32> {
        match self {
            AvailabilityClass::NonCritical => Some(0),
            AvailabilityClass::Standard => Some(1),
            AvailabilityClass::HighAvailability => Some(2),
            AvailabilityClass::MissionCritical => Some(3),
            AvailabilityClass::Custom => None,
        }
    }

    /// Canonical `min_available` for the class, `None` for `Custom`.
    pub fn default_min_available(&self) -> Option<&'static str> {
        match self {
            AvailabilityClass::NonCritical => Some("20%"),
            AvailabilityClass::Standard => Some("50%"),
            AvailabilityClass::HighAvailability => Some("75%"),
            AvailabilityClass::MissionCritical => Some("90%"),
            AvailabilityClass::Custom => None,
        }
    }

    /// Canonical percentage as a number.
    pub fn default_min_available_percent(&self) -> Option<u32> {
        match self {
            AvailabilityClass::NonCritical => Some(20),
            AvailabilityClass::Standard => Some(50),
            AvailabilityClass::HighAvailability => Some(75),
            AvailabilityClass::MissionCritical => Some(90),
            AvailabilityClass::Custom => None,
        }
    }

    /// Priority assigned to generated policies of this class.
    pub fn default_priority(&self) -> i32 {
        match self {
            AvailabilityClass::MissionCritical => 1000,
            AvailabilityClass::HighAvailability => 500,
            AvailabilityClass::Standard => 100,
            AvailabilityClass::NonCritical => 50,
            AvailabilityClass::Custom => 10,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AvailabilityClass::NonCritical => "Best-effort workloads; brief outages are acceptable",
            AvailabilityClass::Standard => "Regular services that should stay mostly available",
            AvailabilityClass::HighAvailability => {
                "Customer-facing services that must survive node maintenance"
            }
            AvailabilityClass::MissionCritical => {
                "Core platform and security services; disruption must be minimal"
            }
            AvailabilityClass::Custom => "Explicit PDB configuration supplied by the policy",
        }
    }
}

impl fmt::Display for AvailabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvailabilityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "non-critical" => Ok(AvailabilityClass::NonCritical),
            "standard" => Ok(AvailabilityClass::Standard),
            "high-availability" => Ok(AvailabilityClass::HighAvailability),
            "mission-critical" => Ok(AvailabilityClass::MissionCritical),
            "custom" => Ok(AvailabilityClass::Custom),
            other => Err(format!(
                "invalid availability class '{}': expected one of non-critical, standard, high-availability, mission-critical, custom",
                other
            )),
        }
    }
}

/// How strictly a policy's violations are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Strict,
    Flexible,
    Advisory,
}

impl EnforcementMode {
    pub const ALL: [EnforcementMode; 3] = [
        EnforcementMode::Strict,
        EnforcementMode::Flexible,
        EnforcementMode::Advisory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementMode::Strict => "strict",
            EnforcementMode::Flexible => "flexible",
            EnforcementMode::Advisory => "advisory",
        }
    }

    /// Severity of a missing-PDB violation under this mode.
    pub fn severity(&self) -> Severity {
        match self {
            EnforcementMode::Strict => Severity::Critical,
            EnforcementMode::Flexible => Severity::Warning,
            EnforcementMode::Advisory => Severity::Info,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EnforcementMode::Strict => "Violations are critical and must be fixed",
            EnforcementMode::Flexible => "Violations are warnings",
            EnforcementMode::Advisory => "Violations are informational only",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation severity. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn order(&self) -> u8 {
        *self as u8
    }
}

/// Coarse workload role from the ODA component model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFunction {
    Core,
    Management,
    Security,
}

impl ComponentFunction {
    pub const ALL: [ComponentFunction; 3] = [
        ComponentFunction::Core,
        ComponentFunction::Management,
        ComponentFunction::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentFunction::Core => "core",
            ComponentFunction::Management => "management",
            ComponentFunction::Security => "security",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComponentFunction::Core => "Business capability implementing the component's API",
            ComponentFunction::Management => "Operational tooling around the component",
            ComponentFunction::Security => "Identity, authentication and authorization services",
        }
    }
}

impl FromStr for ComponentFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "core" => Ok(ComponentFunction::Core),
            "management" => Ok(ComponentFunction::Management),
            "security" => Ok(ComponentFunction::Security),
            other => Err(format!(
                "invalid component function '{}': expected one of core, management, security",
                other
            )),
        }
    }
}
