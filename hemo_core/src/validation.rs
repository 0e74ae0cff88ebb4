//! Field plausibility rules.
//!
//! A value outside the hard range is an error; outside the typical range it
//! is a warning the user may accept.

use crate::keys::CanonicalKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// Outcome of validating a raw field value
#[derive(Clone, Debug, PartialEq)]
pub struct Validation {
    pub severity: Severity,
    pub message: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            severity: Severity::Ok,
            message: None,
        }
    }

    fn with(severity: Severity, message: String) -> Self {
        Self {
            severity,
            message: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Plausibility range for a numeric field, in the key's storage unit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldRule {
    pub min: f64,
    pub max: f64,
    pub typical_low: f64,
    pub typical_high: f64,
}

impl FieldRule {
    pub const fn new(min: f64, max: f64, typical_low: f64, typical_high: f64) -> Self {
        Self {
            min,
            max,
            typical_low,
            typical_high,
        }
    }

    /// Default rule for a numeric key; `None` for token keys
    pub fn for_key(key: CanonicalKey) -> Option<Self> {
        use CanonicalKey as K;
        let rule = match key {
            K::HeightCm => Self::new(30.0, 250.0, 140.0, 200.0),
            K::WeightKg => Self::new(2.0, 350.0, 40.0, 150.0),
            K::BsaM2 => Self::new(0.2, 3.5, 1.4, 2.4),
            K::HrBpm => Self::new(20.0, 250.0, 50.0, 110.0),
            K::HgbGDl => Self::new(3.0, 25.0, 10.0, 17.5),
            K::Sao2Pct => Self::new(10.0, 100.0, 90.0, 100.0),
            K::Svo2Pct => Self::new(10.0, 100.0, 60.0, 80.0),
            K::Vo2MlMin => Self::new(50.0, 1000.0, 150.0, 350.0),
            K::CoLmin => Self::new(0.5, 20.0, 4.0, 8.0),
            K::CiLminM2 => Self::new(0.3, 10.0, 2.2, 4.0),
            K::MapMmhg => Self::new(10.0, 250.0, 65.0, 110.0),
            K::CvpMmhg | K::RapMmhg => Self::new(-5.0, 40.0, 2.0, 8.0),
            K::PaspMmhg => Self::new(5.0, 150.0, 15.0, 30.0),
            K::PadpMmhg => Self::new(0.0, 80.0, 4.0, 12.0),
            K::MpapMmhg => Self::new(3.0, 100.0, 10.0, 20.0),
            K::PawpMmhg => Self::new(0.0, 60.0, 6.0, 15.0),
            K::SvrWood => Self::new(1.0, 60.0, 10.0, 20.0),
            K::SvrDyn => Self::new(80.0, 4800.0, 800.0, 1600.0),
            K::PvrWood => Self::new(0.0, 30.0, 0.25, 2.0),
            K::PvrDyn => Self::new(0.0, 2400.0, 20.0, 160.0),
            K::Papi => Self::new(0.0, 30.0, 0.9, 10.0),
            K::CpoW => Self::new(0.0, 5.0, 0.6, 1.5),
            K::CpiWM2 => Self::new(0.0, 3.0, 0.4, 0.9),
            K::CoMethod | K::SvrUnits | K::PvrUnits => return None,
        };
        Some(rule)
    }
}

/// Validate a raw string value against a rule
pub fn validate(raw: &str, rule: &FieldRule) -> Validation {
    let value = match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return Validation::with(Severity::Error, format!("'{}' is not a number", raw)),
    };

    if value < rule.min || value > rule.max {
        return Validation::with(
            Severity::Error,
            format!("{} is outside {}..{}", value, rule.min, rule.max),
        );
    }

    if value < rule.typical_low || value > rule.typical_high {
        return Validation::with(
            Severity::Warning,
            format!(
                "{} is outside the typical range {}..{}",
                value, rule.typical_low, rule.typical_high
            ),
        );
    }

    Validation::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_numeric_key_has_a_rule() {
        for key in CanonicalKey::ALL {
            let numeric = key.kind() == crate::keys::KeyKind::Numeric;
            assert_eq!(FieldRule::for_key(key).is_some(), numeric, "{}", key);
        }
    }

    #[test]
    fn test_severity_bands() {
        let rule = FieldRule::for_key(CanonicalKey::CoLmin).unwrap();
        assert_eq!(validate("5.2", &rule).severity, Severity::Ok);
        assert_eq!(validate("2.5", &rule).severity, Severity::Warning);
        assert_eq!(validate("42", &rule).severity, Severity::Error);
        assert!(validate("abc", &rule).is_error());
        assert!(validate("NaN", &rule).is_error());
    }
}
