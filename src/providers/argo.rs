//! ARGO float profiles, one NetCDF file per float.
use crate::{
    config::{ProviderConfig, TemplateSet},
    error::ConfigurationError,
    loaders::{NetcdfReader, SourceLoader},
    values::Value,
    variables::{Alias, Correction, VariableRegistry},
};

use super::{configure, from_unit, in_file, not_in_file, reader, NUTRIENTS_GROUP};

pub const NAME: &str = "ARGO";
pub const FILES_PATTERN: &str = ".*.nc";

/// Chlorophyll below this value (mg/m3) is not a valid measurement.
const CPHL_DETECTION_LIMIT: f64 = 0.01;

fn adjusted_or_raw(variable: &str) -> Vec<Alias> {
    vec![
        Alias::flagged(format!("{variable}_ADJUSTED"), format!("{variable}_ADJUSTED_QC"), [1]),
        Alias::flagged(variable, format!("{variable}_QC"), [1]),
    ]
}

fn chlorophyll_floor() -> Correction {
    Correction::new("chlorophyll detection limit", |v: &Value| {
        Ok(match v.numeric_value() {
            Some(x) if x < CPHL_DETECTION_LIMIT => Value::Missing,
            _ => v.clone(),
        })
    })
}

pub fn registry(templates: &TemplateSet) -> Result<VariableRegistry, ConfigurationError> {
    VariableRegistry::from_descriptors(NAME, [
        not_in_file(templates, "provider")?,
        not_in_file(templates, "expocode")?,
        in_file(templates, "date", &["TIME"])?,
        not_in_file(templates, "year")?,
        not_in_file(templates, "month")?,
        not_in_file(templates, "day")?,
        not_in_file(templates, "hour")?,
        in_file(templates, "longitude", &["LONGITUDE"])?,
        in_file(templates, "latitude", &["LATITUDE"])?,
        in_file(templates, "depth", &["PRES_ADJUSTED"])?
            .drop_rows_if_missing()
            .with_correction(Correction::numeric("negative absolute value", |x| -x.abs()))?,
        templates.get("temperature")?.bind_as(adjusted_or_raw("TEMP"))?,
        templates.get("salinity")?.bind_as(adjusted_or_raw("PSAL"))?,
        from_unit(in_file(templates, "oxygen", &["DOX2_ADJUSTED", "DOX2"])?, "umol/kg")?,
        not_in_file(templates, "phosphate")?,
        not_in_file(templates, "nitrate")?,
        not_in_file(templates, "silicate")?,
        templates.get("chlorophyll")?.bind_as(adjusted_or_raw("CPHL"))?
            .drop_rows_if_group_missing(NUTRIENTS_GROUP)
            .with_correction(chlorophyll_floor())?,
    ])
}

pub fn loader(templates: &TemplateSet, config: &ProviderConfig) -> Result<SourceLoader, ConfigurationError> {
    Ok(configure(SourceLoader::from_config(NAME, config, FILES_PATTERN, registry(templates)?, reader(NetcdfReader::new()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chlorophyll_floor() {
        let c = chlorophyll_floor();
        assert_eq!(c.apply(&Value::Float(0.001)).unwrap(), Value::Missing);
        assert_eq!(c.apply(&Value::Float(0.5)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_registry_aliases() {
        let r = registry(&TemplateSet::standard()).unwrap();
        let temp = r.get("TEMP").unwrap();
        assert_eq!(temp.aliases()[0].column, "TEMP_ADJUSTED");
        assert_eq!(temp.aliases()[1].flag_column.as_deref(), Some("TEMP_QC"));
        assert!(!r.get("PHOS").unwrap().is_bound());
    }
}
