//! Institute of Marine Research (Norway) bottle data, whitespace-delimited text files.
use crate::{
    config::{ProviderConfig, TemplateSet},
    error::ConfigurationError,
    loaders::{CsvReader, SourceLoader},
    variables::VariableRegistry,
};

use super::{configure, from_unit, in_file, not_in_file, reader, NUTRIENTS_GROUP};

pub const NAME: &str = "IMR";
pub const FILES_PATTERN: &str = "imr_({years}).csv";

pub fn registry(templates: &TemplateSet) -> Result<VariableRegistry, ConfigurationError> {
    VariableRegistry::from_descriptors(NAME, [
        not_in_file(templates, "provider")?,
        not_in_file(templates, "expocode")?,
        not_in_file(templates, "date")?,
        in_file(templates, "year", &["Year"])?,
        in_file(templates, "month", &["Month"])?,
        in_file(templates, "day", &["Day"])?,
        not_in_file(templates, "hour")?,
        in_file(templates, "longitude", &["Long"])?,
        in_file(templates, "latitude", &["Lati"])?,
        in_file(templates, "depth", &["Depth"])?.drop_rows_if_missing(),
        in_file(templates, "temperature", &["Temp"])?,
        in_file(templates, "salinity", &["Saln."])?,
        from_unit(in_file(templates, "oxygen", &["Oxygen", "Doxy"])?, "ml/l")?,
        in_file(templates, "phosphate", &["Phosphate"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "nitrate", &["Nitrate"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "silicate", &["Silicate"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "chlorophyll", &["Chl."])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
    ])
}

pub fn loader(templates: &TemplateSet, config: &ProviderConfig) -> Result<SourceLoader, ConfigurationError> {
    let reader = reader(CsvReader::whitespace().skip_after_header(1));
    Ok(configure(SourceLoader::from_config(NAME, config, FILES_PATTERN, registry(templates)?, reader)))
}

#[cfg(test)]
mod tests {
    use crate::constraints::Constraints;
    use crate::storer::TableView;
    use crate::values::Value;

    use super::*;

    #[test]
    fn test_oxygen_alias_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("imr_2007.csv"), "\
Year Month Day Long Lati Depth Temp Saln. Doxy Oxygen Phosphate
yyyy mm dd degE degN m degC psu ml/l ml/l umol/l
2007 2 28 5.0 70.0 10 4.5 35.0 1.0 2.0 0.5
").unwrap();
        let config = ProviderConfig {
            path: dir.path().to_path_buf(),
            category: "in_situ".to_string(),
            exclude: vec![],
            files_pattern: None,
        };
        let (storer, report) = loader(&TemplateSet::standard(), &config).unwrap()
            .load(&Constraints::new())
            .unwrap();
        assert_eq!(storer.len(), 1);
        approx::assert_relative_eq!(storer.value("DOXY", 0).and_then(|v| v.as_f64()).unwrap(), 89.3216018);
        assert_eq!(storer.value("HOUR", 0), Some(&Value::Missing));
        assert_eq!(report.absent_variables.get("NTRA"), Some(&1));
    }
}
