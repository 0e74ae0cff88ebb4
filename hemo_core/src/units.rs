//! Display/canonical unit conversion and unit-token normalization.
//!
//! Canonical storage units are fixed per key (see `keys`); screens may show
//! values in any unit of the same dimension.

use serde::{Deserialize, Serialize};

/// Measurement unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    MmHg,
    KPa,
    LitersPerMin,
    MlPerMin,
    LitersPerMinPerM2,
    WoodUnits,
    DynSecCm5,
    Watts,
    WattsPerM2,
    SquareMeters,
    Centimeters,
    Inches,
    Kilograms,
    Pounds,
    GramsPerDl,
    GramsPerL,
    Percent,
    BeatsPerMin,
    Unitless,
}

/// Physical dimension a unit measures; conversion is only defined within one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dimension {
    Pressure,
    Flow,
    FlowIndex,
    Resistance,
    Power,
    PowerIndex,
    Area,
    Length,
    Mass,
    Concentration,
    Fraction,
    Rate,
    Ratio,
}

/// 1 Wood unit (mmHg·min/L) expressed in dyn·s·cm⁻⁵
pub const DYN_PER_WOOD: f64 = 80.0;

/// 1 kPa expressed in mmHg
const MMHG_PER_KPA: f64 = 7.500_616_827;

impl Unit {
    /// Dimension and multiplier to the dimension's base unit
    fn dimension(self) -> (Dimension, f64) {
        match self {
            Unit::MmHg => (Dimension::Pressure, 1.0),
            Unit::KPa => (Dimension::Pressure, MMHG_PER_KPA),
            Unit::LitersPerMin => (Dimension::Flow, 1.0),
            Unit::MlPerMin => (Dimension::Flow, 0.001),
            Unit::LitersPerMinPerM2 => (Dimension::FlowIndex, 1.0),
            Unit::WoodUnits => (Dimension::Resistance, 1.0),
            Unit::DynSecCm5 => (Dimension::Resistance, 1.0 / DYN_PER_WOOD),
            Unit::Watts => (Dimension::Power, 1.0),
            Unit::WattsPerM2 => (Dimension::PowerIndex, 1.0),
            Unit::SquareMeters => (Dimension::Area, 1.0),
            Unit::Centimeters => (Dimension::Length, 1.0),
            Unit::Inches => (Dimension::Length, 2.54),
            Unit::Kilograms => (Dimension::Mass, 1.0),
            Unit::Pounds => (Dimension::Mass, 0.453_592_37),
            Unit::GramsPerDl => (Dimension::Concentration, 1.0),
            Unit::GramsPerL => (Dimension::Concentration, 0.1),
            Unit::Percent => (Dimension::Fraction, 1.0),
            Unit::BeatsPerMin => (Dimension::Rate, 1.0),
            Unit::Unitless => (Dimension::Ratio, 1.0),
        }
    }

    /// Short display label
    pub fn label(self) -> &'static str {
        match self {
            Unit::MmHg => "mmHg",
            Unit::KPa => "kPa",
            Unit::LitersPerMin => "L/min",
            Unit::MlPerMin => "mL/min",
            Unit::LitersPerMinPerM2 => "L/min/m²",
            Unit::WoodUnits => "WU",
            Unit::DynSecCm5 => "dyn·s·cm⁻⁵",
            Unit::Watts => "W",
            Unit::WattsPerM2 => "W/m²",
            Unit::SquareMeters => "m²",
            Unit::Centimeters => "cm",
            Unit::Inches => "in",
            Unit::Kilograms => "kg",
            Unit::Pounds => "lb",
            Unit::GramsPerDl => "g/dL",
            Unit::GramsPerL => "g/L",
            Unit::Percent => "%",
            Unit::BeatsPerMin => "bpm",
            Unit::Unitless => "",
        }
    }
}

/// Convert a value between two units of the same dimension
///
/// Returns `None` when the units measure different things.
pub fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    let (from_dim, from_factor) = from.dimension();
    let (to_dim, to_factor) = to.dimension();
    if from_dim != to_dim {
        return None;
    }
    Some(value * from_factor / to_factor)
}

/// Format a number for an editable field: rounded to `decimals`, trailing
/// zeros trimmed
pub fn format_value(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    if !text.contains('.') {
        return text;
    }
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical spelling for resistance unit tokens (`WOOD` or `DYN`)
///
/// Accepts the spellings calculators have historically emitted.
pub fn normalize_resistance_token(token: &str) -> Option<&'static str> {
    let upper = token.trim().to_uppercase();
    let compact: String = upper
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '·' | '*' | '/' | '-' | '_'))
        .collect();

    match compact.as_str() {
        "WU" | "WOOD" | "WOODUNITS" | "WOODUNIT" | "HRU" | "MMHGMINL" => Some("WOOD"),
        c if c.starts_with("DYN") => Some("DYN"),
        _ => None,
    }
}

/// Canonical spelling for cardiac-output method tags
///
/// Upper snake case, with the common abbreviations expanded.
pub fn normalize_method_token(token: &str) -> Option<String> {
    let words: Vec<String> = token
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_uppercase())
        .collect();
    if words.is_empty() {
        return None;
    }

    let joined = words.join("_");
    let normalized = match joined.as_str() {
        "TD" | "THERMO" | "THERMODILUTION" => "THERMODILUTION".to_string(),
        "DIRECT_FICK" | "FICK" | "MEASURED_FICK" => "FICK".to_string(),
        "ASSUMED_FICK" | "INDIRECT_FICK" | "ESTIMATED_FICK" => "ESTIMATED_FICK".to_string(),
        _ => joined,
    };
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_unit_is_identity() {
        assert_eq!(convert(5.2, Unit::LitersPerMin, Unit::LitersPerMin), Some(5.2));
    }

    #[test]
    fn test_resistance_conversion() {
        let dyn_value = convert(14.3, Unit::WoodUnits, Unit::DynSecCm5).unwrap();
        assert!((dyn_value - 1144.0).abs() < 1e-9);

        let wood = convert(800.0, Unit::DynSecCm5, Unit::WoodUnits).unwrap();
        assert!((wood - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pressure_conversion() {
        let kpa = convert(75.0, Unit::MmHg, Unit::KPa).unwrap();
        assert!((kpa - 9.999_18).abs() < 1e-3);
    }

    #[test]
    fn test_cross_dimension_is_rejected() {
        assert_eq!(convert(5.0, Unit::MmHg, Unit::LitersPerMin), None);
        assert_eq!(convert(5.0, Unit::WoodUnits, Unit::Watts), None);
    }

    #[test]
    fn test_format_value_trims() {
        assert_eq!(format_value(5.2, 2), "5.2");
        assert_eq!(format_value(5.0, 2), "5");
        assert_eq!(format_value(1144.0, 0), "1144");
        assert_eq!(format_value(2.888_888, 2), "2.89");
        assert_eq!(format_value(-0.0001, 2), "0");
    }

    #[test]
    fn test_resistance_tokens() {
        assert_eq!(normalize_resistance_token("WU"), Some("WOOD"));
        assert_eq!(normalize_resistance_token("wood"), Some("WOOD"));
        assert_eq!(normalize_resistance_token(" Wood units "), Some("WOOD"));
        assert_eq!(normalize_resistance_token("dyn·s·cm⁻⁵"), Some("DYN"));
        assert_eq!(normalize_resistance_token("DYNES"), Some("DYN"));
        assert_eq!(normalize_resistance_token("furlongs"), None);
    }

    #[test]
    fn test_method_tokens() {
        assert_eq!(normalize_method_token("td").as_deref(), Some("THERMODILUTION"));
        assert_eq!(normalize_method_token("Fick").as_deref(), Some("FICK"));
        assert_eq!(
            normalize_method_token("assumed fick").as_deref(),
            Some("ESTIMATED_FICK")
        );
        assert_eq!(normalize_method_token("   "), None);
    }
}
