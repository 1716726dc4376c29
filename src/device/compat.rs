//! Runtime compatibility gate for the legacy architecture class
//!
//! The legacy class is only supported by runtimes from 6.5 through 11.4
//! (both inclusive). Outside that window the gate returns an incompatible
//! verdict with a reason naming the violated bound. The gate never fails:
//! a verdict is advisory and only degrades the device policy.

use std::fmt;

use serde::Serialize;

use super::probe::ArchitectureClass;

/// Oldest runtime supporting the legacy class
pub const LEGACY_MIN_RUNTIME: RuntimeVersion = RuntimeVersion { major: 6, minor: 5 };

/// Newest runtime supporting the legacy class
pub const LEGACY_MAX_RUNTIME: RuntimeVersion = RuntimeVersion { major: 11, minor: 4 };

/// GPU runtime version, ordered lexicographically by (major, minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuntimeVersion {
    pub major: i32,
    pub minor: i32,
}

impl RuntimeVersion {
    pub const fn new(major: i32, minor: i32) -> Self {
        RuntimeVersion { major, minor }
    }

    /// Decode the runtime's integer encoding (`1000 * major + 10 * minor`)
    ///
    /// `11040` is 11.4, `6050` is 6.5.
    pub fn from_raw(raw: i32) -> Self {
        RuntimeVersion {
            major: raw / 1000,
            minor: (raw % 1000) / 10,
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Outcome of the compatibility gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityVerdict {
    pub is_compatible: bool,
    pub reason: Option<String>,
}

impl CompatibilityVerdict {
    pub fn compatible() -> Self {
        CompatibilityVerdict {
            is_compatible: true,
            reason: None,
        }
    }

    pub fn incompatible(reason: impl Into<String>) -> Self {
        CompatibilityVerdict {
            is_compatible: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check `runtime_version` against the window supported by `architecture_class`
pub fn check(architecture_class: ArchitectureClass, runtime_version: RuntimeVersion) -> CompatibilityVerdict {
    if architecture_class == ArchitectureClass::Standard {
        return CompatibilityVerdict::compatible();
    }

    let verdict = if runtime_version > LEGACY_MAX_RUNTIME {
        CompatibilityVerdict::incompatible(format!(
            "runtime {} exceeds the upper bound {}: legacy devices are only supported up to runtime {}",
            runtime_version, LEGACY_MAX_RUNTIME, LEGACY_MAX_RUNTIME
        ))
    } else if runtime_version < LEGACY_MIN_RUNTIME {
        CompatibilityVerdict::incompatible(format!(
            "runtime {} is below the lower bound {}: legacy devices require runtime {} or newer",
            runtime_version, LEGACY_MIN_RUNTIME, LEGACY_MIN_RUNTIME
        ))
    } else {
        CompatibilityVerdict::compatible()
    };

    if let Some(reason) = &verdict.reason {
        tracing::warn!("compatibility: {}", reason);
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_decodes_runtime_encoding() {
        assert_eq!(RuntimeVersion::from_raw(11040), RuntimeVersion::new(11, 4));
        assert_eq!(RuntimeVersion::from_raw(6050), RuntimeVersion::new(6, 5));
        assert_eq!(RuntimeVersion::from_raw(12020), RuntimeVersion::new(12, 2));
        assert_eq!(RuntimeVersion::from_raw(10000), RuntimeVersion::new(10, 0));
    }

    #[test]
    fn test_version_ordering_is_lexicographic() {
        assert!(RuntimeVersion::new(10, 9) < RuntimeVersion::new(11, 0));
        assert!(RuntimeVersion::new(11, 4) < RuntimeVersion::new(11, 5));
        assert!(RuntimeVersion::new(6, 5) > RuntimeVersion::new(6, 4));
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        let verdict = check(ArchitectureClass::Legacy, RuntimeVersion::new(11, 4));
        assert!(verdict.is_compatible);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_above_upper_bound_cites_upper_bound() {
        let verdict = check(ArchitectureClass::Legacy, RuntimeVersion::new(11, 5));
        assert!(!verdict.is_compatible);
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("upper bound 11.4"), "{}", reason);
    }

    #[test]
    fn test_lower_bound_is_inclusive() {
        assert!(check(ArchitectureClass::Legacy, RuntimeVersion::new(6, 5)).is_compatible);
    }

    #[test]
    fn test_below_lower_bound_cites_lower_bound() {
        let verdict = check(ArchitectureClass::Legacy, RuntimeVersion::new(6, 4));
        assert!(!verdict.is_compatible);
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("lower bound 6.5"), "{}", reason);
    }

    #[test]
    fn test_standard_is_always_compatible() {
        for version in [
            RuntimeVersion::new(5, 0),
            RuntimeVersion::new(11, 5),
            RuntimeVersion::new(12, 4),
        ] {
            let verdict = check(ArchitectureClass::Standard, version);
            assert_eq!(verdict, CompatibilityVerdict::compatible());
        }
    }
}
