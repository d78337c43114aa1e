//! Unit conversions used as corrections by the provider definitions.
use crate::{error::ConfigurationError, variables::Correction};

/// Density of seawater used to convert per-mass to per-volume concentrations, in kg/L.
pub const SEAWATER_DENSITY: f64 = 1.025;

/// Millimoles of O2 in one milliliter of O2 gas at standard conditions, times 1000 L/m3.
pub const OXYGEN_ML_TO_MMOL: f64 = 44.6608009;

/// µmol/kg to mmol/m3.
pub fn umol_per_kg_to_mmol_per_m3() -> Correction {
    Correction::numeric("umol/kg -> mmol/m3", |x| x * SEAWATER_DENSITY)
}

/// Dissolved oxygen in ml/L to mmol/m3.
pub fn doxy_ml_per_l_to_mmol_per_m3() -> Correction {
    Correction::numeric("ml/L -> mmol/m3", |x| x * OXYGEN_ML_TO_MMOL)
}

/// The correction converting values from one unit to another.
///
/// Brackets around units are ignored, so `[umol/kg]` and `umol/kg` are the same unit.
/// Identical units give a correction that leaves values unchanged.
pub fn conversion_correction(from: &str, to: &str) -> Result<Correction, ConfigurationError> {
    let clean = |u: &str| u.trim().trim_start_matches('[').trim_end_matches(']').to_lowercase();
    let (from_clean, to_clean) = (clean(from), clean(to));
    match (from_clean.as_str(), to_clean.as_str()) {
        (a, b) if a == b => Ok(Correction::numeric("no unit conversion", |x| x)),
        ("umol/kg" | "µmol/kg", "mmol/m3") => Ok(umol_per_kg_to_mmol_per_m3()),
        ("ml/l", "mmol/m3") => Ok(doxy_ml_per_l_to_mmol_per_m3()),
        _ => Err(ConfigurationError::unknown_conversion(from, to)),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::values::Value;

    use super::*;

    #[test]
    fn test_conversions() {
        let c = conversion_correction("[umol/kg]", "[mmol/m3]").unwrap();
        let v = c.apply(&Value::Float(200.0)).unwrap();
        assert_relative_eq!(v.as_f64().unwrap(), 205.0);

        let c = conversion_correction("ml/L", "mmol/m3").unwrap();
        let v = c.apply(&Value::Int(2)).unwrap();
        assert_relative_eq!(v.as_f64().unwrap(), 89.3216018);

        let c = conversion_correction("[mmol/m3]", "mmol/m3").unwrap();
        assert_eq!(c.apply(&Value::Float(3.5)).unwrap(), Value::Float(3.5));

        assert!(matches!(
            conversion_correction("mg/m3", "mmol/m3"),
            Err(ConfigurationError::UnknownConversion { .. })
        ));
    }
}
