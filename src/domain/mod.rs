//! Availability domain model: classes, the `AvailabilityPolicy` resource,
//! selector matching and PDB helpers shared by the tools.

pub mod class;
pub mod pdb;
pub mod policy;
pub mod selector;
pub mod workload;

pub use class::{
    AvailabilityClass, ComponentFunction, EnforcementMode, Severity,
    AVAILABILITY_CLASS_ANNOTATION, COMPONENT_FUNCTION_ANNOTATION,
};
pub use pdb::PdbIndex;
pub use policy::{
    AvailabilityPolicy, AvailabilityPolicySpec, AvailabilityPolicyStatus, ComponentSelector,
    MaintenanceWindow, PdbConfig,
};

/// `covered / total * 100`, zero when `total` is zero.
pub fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Round to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(round2(percentage(1, 3)), 33.33);
    }

    proptest! {
        #[test]
        fn prop_percentage_bounds(total in 1usize..10_000, covered_frac in 0.0f64..=1.0) {
            let covered = ((total as f64) * covered_frac).floor() as usize;
            let pct = percentage(covered, total);
            prop_assert!((0.0..=100.0).contains(&pct));
            prop_assert!((pct - covered as f64 / total as f64 * 100.0).abs() < 1e-9);
        }
    }
}
