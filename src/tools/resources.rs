//! Static reference resources: class, enforcement and function tables.

use crate::domain::{AvailabilityClass, ComponentFunction, EnforcementMode};
use crate::mcp::{McpRegistry, RegisteredResource, RegistryError};
use serde_json::json;

pub const CLASSES_URI: &str = "pdb://availability-classes";
pub const ENFORCEMENT_URI: &str = "pdb://enforcement-modes";
pub const FUNCTIONS_URI: &str = "pdb://component-functions";

const JSON_MIME: &str = "application/json";

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

fn classes_body() -> String {
    let mut classes: Vec<_> = AvailabilityClass::ORDERED
        .iter()
        .map(|c| {
            json!({
                "name": c.as_str(),
                "order": c.order(),
                "min_available": c.default_min_available(),
                "default_priority": c.default_priority(),
                "description": c.description(),
            })
        })
        .collect();
    let custom = AvailabilityClass::Custom;
    classes.push(json!({
        "name": custom.as_str(),
        "min_available": null,
        "default_priority": custom.default_priority(),
        "description": custom.description(),
    }));
    pretty(json!({ "availability_classes": classes }))
}

fn enforcement_body() -> String {
    let modes: Vec<_> = EnforcementMode::ALL
        .iter()
        .map(|m| {
            json!({
                "name": m.as_str(),
                "violation_severity": m.severity(),
                "description": m.description(),
            })
        })
        .collect();
    pretty(json!({ "enforcement_modes": modes }))
}

fn functions_body() -> String {
    let functions: Vec<_> = ComponentFunction::ALL
        .iter()
        .map(|f| json!({ "name": f.as_str(), "description": f.description() }))
        .collect();
    pretty(json!({ "component_functions": functions }))
}

pub fn register_resources(registry: &McpRegistry) -> Result<(), RegistryError> {
    registry.register_resource(
        RegisteredResource::new(CLASSES_URI, "Availability classes")
            .description("Availability classes with their default PDB minAvailable and priority")
            .mime_type(JSON_MIME)
            .body(classes_body()),
    )?;
    registry.register_resource(
        RegisteredResource::new(ENFORCEMENT_URI, "Enforcement modes")
            .description("Policy enforcement modes and the severity of their violations")
            .mime_type(JSON_MIME)
            .body(enforcement_body()),
    )?;
    registry.register_resource(
        RegisteredResource::new(FUNCTIONS_URI, "Component functions")
            .description("ODA component functions used for classification")
            .mime_type(JSON_MIME)
            .body(functions_body()),
    )
}
