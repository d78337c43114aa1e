//! Variables computed from other variables of a storer.
//!
//! Each function returns the descriptor of the new variable and its values, ready to be
//! passed to [`Storer::add_feature`]. A row with a missing input gets a missing value.
use std::str::FromStr;

use crate::{
    error::SchemaError,
    format::ValueFormat,
    storer::{Storer, TableView},
    values::{Value, ValueType},
    variables::{VariableDescriptor, VariableTemplate},
};

fn feature_descriptor(name: &str, unit: &str) -> VariableDescriptor {
    let fmt = |s: &str| ValueFormat::from_str(s).unwrap_or_default();
    VariableTemplate::new(name, unit, ValueType::Float)
        .with_formats(fmt("%-10s"), fmt("%10.3f"))
        .unbound()
}

fn float_column<'a>(storer: &'a Storer, label: &str) -> Result<impl Iterator<Item = Option<f64>> + 'a, SchemaError> {
    let column = storer.table().column(label)
        .ok_or_else(|| SchemaError::missing_column(format!("{} data", storer.category()), label))?;
    Ok(column.iter().map(|v| v.as_f64()))
}

/// Sea pressure (dbar) from depth (m) and latitude (degrees), after Saunders (1981).
///
/// The sign of the depth is ignored, so depths stored as negative numbers work as well.
pub fn saunders_pressure(depth: f64, latitude: f64) -> Option<f64> {
    let x = latitude.abs().to_radians().sin();
    let c1 = 5.92e-3 + x * x * 5.25e-3;
    let discriminant = (1.0 - c1).powi(2) - 8.84e-6 * depth.abs();
    if discriminant < 0.0 {
        return None;
    }
    Some(((1.0 - c1) - discriminant.sqrt()) / 4.42e-6)
}

/// Density of seawater at zero pressure (kg/m3), UNESCO 1983 equation of state.
///
/// `temperature` is in °C (ITS-90) and `salinity` in psu.
pub fn density_at_surface(salinity: f64, temperature: f64) -> Option<f64> {
    if salinity < 0.0 {
        return None;
    }
    let t = temperature * 1.00024;
    let smow = 999.842594 + t * (6.793952e-2 + t * (-9.095290e-3 + t * (1.001685e-4 + t * (-1.120083e-6 + t * 6.536332e-9))));
    let b = 8.24493e-1 + t * (-4.0899e-3 + t * (7.6438e-5 + t * (-8.2467e-7 + t * 5.3875e-9)));
    let c = -5.72466e-3 + t * (1.0227e-4 + t * -1.6546e-6);
    let d = 4.8314e-4;
    Some(smow + b * salinity + c * salinity.powf(1.5) + d * salinity * salinity)
}

/// Pressure (`PRES`, dbar) of every row of `storer`.
pub fn compute_pressure(storer: &Storer, depth_label: &str, latitude_label: &str) -> Result<(VariableDescriptor, Vec<Value>), SchemaError> {
    let values = float_column(storer, depth_label)?
        .zip(float_column(storer, latitude_label)?)
        .map(|(depth, lat)| match (depth, lat) {
            (Some(d), Some(l)) => saunders_pressure(d, l).map(Value::Float).unwrap_or_default(),
            _ => Value::Missing,
        })
        .collect();
    Ok((feature_descriptor("PRES", "[dbars]"), values))
}

/// Sigma-t (`SIGT`, kg/m3), the surface density minus 1000, of every row of `storer`.
pub fn compute_sigma_t(storer: &Storer, salinity_label: &str, temperature_label: &str) -> Result<(VariableDescriptor, Vec<Value>), SchemaError> {
    let values = float_column(storer, salinity_label)?
        .zip(float_column(storer, temperature_label)?)
        .map(|(sal, temp)| match (sal, temp) {
            (Some(s), Some(t)) => density_at_surface(s, t).map(|rho| Value::Float(rho - 1000.0)).unwrap_or_default(),
            _ => Value::Missing,
        })
        .collect();
    Ok((feature_descriptor("SIGT", "[kg/m3]"), values))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use crate::test_utils::example_storer;

    use super::*;

    #[rstest]
    #[case(7321.45, 30.0, 7500.0065)]
    #[case(-1000.0, 60.0, 1012.2426)]
    #[case(0.0, 10.0, 0.0)]
    fn test_pressure(#[case] depth: f64, #[case] lat: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(saunders_pressure(depth, lat).unwrap(), expected, epsilon = 1e-3);
    }

    #[rstest]
    #[case(35.0, 0.0, 28.1063)]
    #[case(35.0, 25.0, 23.3412)]
    fn test_sigma_t(#[case] s: f64, #[case] t: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(density_at_surface(s, t).unwrap() - 1000.0, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_add_pressure_feature() {
        let mut storer = example_storer();
        let (descriptor, values) = compute_pressure(&storer, "LATITUDE", "LATITUDE").unwrap();
        assert_eq!(descriptor.name(), "PRES");
        assert_eq!(values.len(), storer.len());
        storer.add_feature(descriptor, values).unwrap();
        assert!(storer.registry().contains("PRES"));

        assert!(compute_pressure(&storer, "DEPH", "LATITUDE").is_err());
    }
}
